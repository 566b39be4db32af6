//! 80-byte block header: wire encoding, hashing and object form

use crate::constants::BLOCK_HEADER_SIZE;
use crate::encode::Reader;
use crate::error::{ConsensusError, Result};
use crate::hash::sha256d;
use crate::transaction::{hash_from_display_hex, hash_to_display_hex};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Serialize block header: version, prev hash, merkle root, time, bits, nonce (all LE)
pub fn serialize_header(header: &BlockHeader) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(BLOCK_HEADER_SIZE);
    bytes.extend_from_slice(&header.version.to_le_bytes());
    bytes.extend_from_slice(&header.prev_block_hash);
    bytes.extend_from_slice(&header.merkle_root);
    bytes.extend_from_slice(&header.timestamp.to_le_bytes());
    bytes.extend_from_slice(&header.bits.to_le_bytes());
    bytes.extend_from_slice(&header.nonce.to_le_bytes());
    bytes
}

pub fn read_header(reader: &mut Reader) -> Result<BlockHeader> {
    Ok(BlockHeader {
        version: reader.read_i32_le()?,
        prev_block_hash: reader.read_hash()?,
        merkle_root: reader.read_hash()?,
        timestamp: reader.read_u32_le()?,
        bits: reader.read_u32_le()?,
        nonce: reader.read_u32_le()?,
    })
}

pub fn deserialize_header(data: &[u8]) -> Result<BlockHeader> {
    if data.len() != BLOCK_HEADER_SIZE {
        return Err(ConsensusError::InvalidLength {
            expected: BLOCK_HEADER_SIZE,
            actual: data.len(),
        });
    }
    read_header(&mut Reader::new(data))
}

/// Block hash in internal byte order
pub fn block_hash(header: &BlockHeader) -> Hash {
    sha256d(&serialize_header(header))
}

/// Plain-object form of a header; hashes are display-order hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeaderObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub version: i32,
    pub prev_hash: String,
    pub merkle_root: String,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

pub fn header_to_object(header: &BlockHeader) -> BlockHeaderObject {
    BlockHeaderObject {
        hash: Some(hash_to_display_hex(&block_hash(header))),
        version: header.version,
        prev_hash: hash_to_display_hex(&header.prev_block_hash),
        merkle_root: hash_to_display_hex(&header.merkle_root),
        time: header.timestamp,
        bits: header.bits,
        nonce: header.nonce,
    }
}

/// Rebuild a header; a supplied `hash` must match the recomputed one
pub fn header_from_object(obj: &BlockHeaderObject) -> Result<BlockHeader> {
    let header = BlockHeader {
        version: obj.version,
        prev_block_hash: hash_from_display_hex(&obj.prev_hash)?,
        merkle_root: hash_from_display_hex(&obj.merkle_root)?,
        timestamp: obj.time,
        bits: obj.bits,
        nonce: obj.nonce,
    };
    if let Some(expected) = &obj.hash {
        let actual = hash_to_display_hex(&block_hash(&header));
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(ConsensusError::MalformedInput(format!(
                "header hash {} does not match contents ({})",
                expected, actual
            )));
        }
    }
    Ok(header)
}
