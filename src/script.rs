//! Script value object: parsing, standard templates and address extraction
//!
//! Scripts are kept as raw bytes. Only the templates needed for address
//! derivation and P2SH multisig spending are built or recognized here; there is
//! no interpreter.

use crate::address::AddressType;
use crate::constants::MAX_MULTISIG_KEYS;
use crate::error::{ConsensusError, Result};
use crate::hash::hash160;
use crate::key::PublicKey;
use crate::types::{ByteString, Hash160};
use serde::{Deserialize, Serialize};
use std::fmt;

// Opcodes used by the standard templates
pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// One parsed element of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A non-push opcode
    Op(u8),
    /// A data push, with the opcode that introduced it
    Push { opcode: u8, data: ByteString },
}

impl Chunk {
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Chunk::Push { data, .. } => Some(data),
            Chunk::Op(_) => None,
        }
    }
}

/// Opaque byte-serializable script
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script {
    bytes: ByteString,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a serialized script
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let script = Self {
            bytes: bytes.to_vec(),
        };
        script.chunks()?;
        Ok(script)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(s)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> ByteString {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.bytes.push(opcode);
        self
    }

    /// Push data with the smallest push opcode that fits
    pub fn push_data(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.bytes.push(len as u8);
        } else if len <= 0xff {
            self.bytes.push(OP_PUSHDATA1);
            self.bytes.push(len as u8);
        } else if len <= 0xffff {
            self.bytes.push(OP_PUSHDATA2);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.bytes.push(OP_PUSHDATA4);
            self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    /// Split the script into opcodes and data pushes
    pub fn chunks(&self) -> Result<Vec<Chunk>> {
        let bytes = &self.bytes;
        let mut chunks = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            let opcode = bytes[pos];
            pos += 1;

            let len = match opcode {
                0x01..=0x4b => opcode as usize,
                OP_PUSHDATA1 => read_push_len(bytes, &mut pos, 1)?,
                OP_PUSHDATA2 => read_push_len(bytes, &mut pos, 2)?,
                OP_PUSHDATA4 => read_push_len(bytes, &mut pos, 4)?,
                OP_0 => {
                    chunks.push(Chunk::Push { opcode, data: Vec::new() });
                    continue;
                }
                _ => {
                    chunks.push(Chunk::Op(opcode));
                    continue;
                }
            };

            if bytes.len() - pos < len {
                return Err(ConsensusError::MalformedInput(format!(
                    "script push of {} bytes at offset {} overruns script of {} bytes",
                    len,
                    pos,
                    bytes.len()
                )));
            }
            chunks.push(Chunk::Push {
                opcode,
                data: bytes[pos..pos + len].to_vec(),
            });
            pos += len;
        }

        Ok(chunks)
    }

    /// HASH160 of the serialized script
    pub fn hash160(&self) -> Hash160 {
        hash160(&self.bytes)
    }

    // ============================================================================
    // TEMPLATE BUILDERS
    // ============================================================================

    /// OP_m <pubkey_1> ... <pubkey_n> OP_n OP_CHECKMULTISIG, keys sorted by hex encoding
    pub fn build_multisig_out(public_keys: &[PublicKey], threshold: usize) -> Result<Script> {
        let n = public_keys.len();
        if n == 0 || n > MAX_MULTISIG_KEYS {
            return Err(ConsensusError::MalformedInput(format!(
                "multisig needs between 1 and {} public keys, got {}",
                MAX_MULTISIG_KEYS, n
            )));
        }
        if threshold == 0 || threshold > n {
            return Err(ConsensusError::MalformedInput(format!(
                "threshold {} out of range for {} public keys",
                threshold, n
            )));
        }

        let mut sorted: Vec<&PublicKey> = public_keys.iter().collect();
        sorted.sort_by_key(|k| k.to_string());

        let mut script = Script::new().push_opcode(small_int_opcode(threshold));
        for key in sorted {
            script = script.push_data(&key.to_bytes());
        }
        Ok(script
            .push_opcode(small_int_opcode(n))
            .push_opcode(OP_CHECKMULTISIG))
    }

    /// OP_HASH160 <hash160(script)> OP_EQUAL
    pub fn build_script_hash_out(script: &Script) -> Script {
        Self::build_script_hash_out_from_hash(&script.hash160())
    }

    pub fn build_script_hash_out_from_hash(hash: &Hash160) -> Script {
        Script::new()
            .push_opcode(OP_HASH160)
            .push_data(hash)
            .push_opcode(OP_EQUAL)
    }

    /// OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG
    pub fn build_public_key_hash_out(hash: &Hash160) -> Script {
        Script::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_data(hash)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
    }

    /// OP_0 <sig_1> ... <sig_k> <redeem script>
    ///
    /// Each signature is DER plus its sighash byte. The leading OP_0 is the
    /// extra element OP_CHECKMULTISIG pops. `cached_redeem` skips rebuilding the
    /// redeem script from the keys.
    pub fn build_p2sh_multisig_in(
        public_keys: &[PublicKey],
        threshold: usize,
        signatures: &[ByteString],
        cached_redeem: Option<&Script>,
    ) -> Result<Script> {
        let redeem = match cached_redeem {
            Some(script) => script.clone(),
            None => Self::build_multisig_out(public_keys, threshold)?,
        };

        let mut script = Script::new().push_opcode(OP_0);
        for signature in signatures {
            script = script.push_data(signature);
        }
        Ok(script.push_data(redeem.as_bytes()))
    }

    // ============================================================================
    // TEMPLATE RECOGNITION
    // ============================================================================

    pub fn is_public_key_hash_out(&self) -> bool {
        let b = &self.bytes;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    pub fn is_script_hash_out(&self) -> bool {
        let b = &self.bytes;
        b.len() == 23 && b[0] == OP_HASH160 && b[1] == 20 && b[22] == OP_EQUAL
    }

    /// <signature> <public key>
    pub fn is_public_key_hash_in(&self) -> bool {
        match self.chunks().as_deref() {
            Ok([Chunk::Push { data: sig, .. }, Chunk::Push { data: key, .. }]) => {
                looks_like_signature(sig) && PublicKey::is_valid_encoding(key)
            }
            _ => false,
        }
    }

    /// OP_0 <data>... <redeem script>, where the redeem script has a standard shape
    pub fn is_script_hash_in(&self) -> bool {
        let Ok(chunks) = self.chunks() else {
            return false;
        };
        if chunks.len() < 2 || chunks[0] != (Chunk::Push { opcode: OP_0, data: Vec::new() }) {
            return false;
        }
        if !chunks.iter().all(|c| matches!(c, Chunk::Push { .. })) {
            return false;
        }
        match chunks.last().and_then(Chunk::data) {
            Some(redeem) => Script::from_bytes(redeem).map_or(false, |r| r.is_standard_redeem()),
            None => false,
        }
    }

    /// <public key> OP_CHECKSIG
    pub fn is_public_key_out(&self) -> bool {
        match self.chunks().as_deref() {
            Ok([Chunk::Push { data: key, .. }, Chunk::Op(OP_CHECKSIG)]) => {
                PublicKey::is_valid_encoding(key)
            }
            _ => false,
        }
    }

    fn is_standard_redeem(&self) -> bool {
        self.is_multisig_out() || self.is_public_key_hash_out() || self.is_public_key_out()
    }

    pub fn is_multisig_out(&self) -> bool {
        let Ok(chunks) = self.chunks() else {
            return false;
        };
        if chunks.len() < 4 {
            return false;
        }
        let (Chunk::Op(m), Chunk::Op(n), Chunk::Op(last)) =
            (&chunks[0], &chunks[chunks.len() - 2], &chunks[chunks.len() - 1])
        else {
            return false;
        };
        let keys = &chunks[1..chunks.len() - 2];
        (OP_1..=OP_16).contains(m)
            && (OP_1..=OP_16).contains(n)
            && *last == OP_CHECKMULTISIG
            && keys.len() == (n - OP_1 + 1) as usize
            && m <= n
            && keys
                .iter()
                .all(|c| c.data().map_or(false, PublicKey::is_valid_encoding))
    }

    /// Address payload this script commits to, if it has a standard shape
    ///
    /// Recognizes P2PKH and P2SH outputs and inputs.
    pub fn address_info(&self) -> Option<(AddressType, Hash160)> {
        if self.is_public_key_hash_out() {
            return Some((AddressType::PubKeyHash, copy_hash160(&self.bytes[3..23])));
        }
        if self.is_script_hash_out() {
            return Some((AddressType::ScriptHash, copy_hash160(&self.bytes[2..22])));
        }

        let chunks = self.chunks().ok()?;
        if self.is_public_key_hash_in() {
            let key = chunks.get(1)?.data()?;
            return Some((AddressType::PubKeyHash, hash160(key)));
        }
        if self.is_script_hash_in() {
            let redeem = chunks.last()?.data()?;
            return Some((AddressType::ScriptHash, hash160(redeem)));
        }
        None
    }
}

impl From<ByteString> for Script {
    /// Wrap bytes without validating them, e.g. an output script of unknown shape
    fn from(bytes: ByteString) -> Self {
        Script { bytes }
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<Script: {}>", hex::encode(&self.bytes))
    }
}

fn small_int_opcode(n: usize) -> u8 {
    debug_assert!((1..=16).contains(&n));
    OP_1 + (n as u8 - 1)
}

fn read_push_len(bytes: &[u8], pos: &mut usize, width: usize) -> Result<usize> {
    if bytes.len() - *pos < width {
        return Err(ConsensusError::MalformedInput(format!(
            "truncated push length at offset {}",
            pos
        )));
    }
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(&bytes[*pos..*pos + width]);
    *pos += width;
    Ok(u32::from_le_bytes(buf) as usize)
}

/// DER signature (SEQUENCE tag) followed by one sighash byte
fn looks_like_signature(data: &[u8]) -> bool {
    (9..=73).contains(&data.len()) && data[0] == 0x30
}

fn copy_hash160(slice: &[u8]) -> Hash160 {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(slice);
    hash
}
