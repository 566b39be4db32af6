//! Merkle blocks: a block header plus a partial Merkle tree proving which
//! transactions the block contains
//!
//! The partial tree is a depth-first list of hashes and a bit stream of flags.
//! A set flag on an inner node means "descend"; on a leaf it marks a matched
//! transaction. Verification rebuilds the root from both streams, which must
//! be consumed exactly.

use crate::block::{
    header_from_object, header_to_object, read_header, serialize_header, BlockHeaderObject,
};
use crate::encode::{encode_varint, Reader};
use crate::error::{ConsensusError, MerkleProofError, Result};
use crate::hash::sha256d;
use crate::transaction::{hash_from_display_hex, transaction_id};
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Cursor positions threaded through a traversal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalState {
    pub flag_bits_used: usize,
    pub hashes_used: usize,
    /// Leaves flagged as matches, in tree order
    pub matched: Vec<Hash>,
}

/// What [`MerkleBlock::has_transaction`] looks up
#[derive(Debug, Clone, Copy)]
pub enum TxRef<'a> {
    Transaction(&'a Transaction),
    /// Hex of the hash in wire byte order, as held in the object form
    Id(&'a str),
    /// Hex transaction id in display (byte-reversed) order
    DisplayId(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MerkleBlockObject", try_from = "MerkleBlockObject")]
pub struct MerkleBlock {
    header: BlockHeader,
    num_transactions: u32,
    /// Tree hashes in wire byte order
    hashes: Vec<Hash>,
    flags: Vec<u8>,
}

/// Plain-object form; hashes are hex of their wire bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleBlockObject {
    pub header: BlockHeaderObject,
    pub num_transactions: u32,
    pub hashes: Vec<String>,
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    pub fn new(header: BlockHeader, num_transactions: u32, hashes: Vec<Hash>, flags: Vec<u8>) -> Self {
        MerkleBlock {
            header,
            num_transactions,
            hashes,
            flags,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn num_transactions(&self) -> u32 {
        self.num_transactions
    }

    /// Tree hashes in wire byte order
    pub fn hashes(&self) -> &[Hash] {
        &self.hashes
    }

    pub fn flags(&self) -> &[u8] {
        &self.flags
    }

    /// Number of nodes at `height` (leaves are height 0)
    pub fn tree_width(&self, height: u32) -> u64 {
        let n = self.num_transactions as u64;
        (n + (1u64 << height) - 1) >> height
    }

    /// Height of the root
    pub fn tree_height(&self) -> u32 {
        let mut height = 0;
        while self.tree_width(height) > 1 {
            height += 1;
        }
        height
    }

    /// Compute the hash of the node at (`depth`, `pos`), consuming flags and hashes
    pub fn traverse(
        &self,
        depth: u32,
        pos: u64,
        mut state: TraversalState,
    ) -> std::result::Result<(Hash, TraversalState), MerkleProofError> {
        if state.flag_bits_used >= self.flags.len() * 8 {
            return Err(MerkleProofError::FlagBitsExhausted);
        }
        let bit = state.flag_bits_used;
        let is_parent_of_match = (self.flags[bit >> 3] >> (bit & 7)) & 1 == 1;
        state.flag_bits_used += 1;

        if depth == 0 || !is_parent_of_match {
            let hash = *self
                .hashes
                .get(state.hashes_used)
                .ok_or(MerkleProofError::HashesExhausted)?;
            state.hashes_used += 1;
            if depth == 0 && is_parent_of_match {
                state.matched.push(hash);
            }
            return Ok((hash, state));
        }

        let (left, state) = self.traverse(depth - 1, pos * 2, state)?;
        let (right, state) = if pos * 2 + 1 < self.tree_width(depth - 1) {
            self.traverse(depth - 1, pos * 2 + 1, state)?
        } else {
            (left, state)
        };

        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(&left);
        concat[32..].copy_from_slice(&right);
        Ok((sha256d(&concat), state))
    }

    /// Full traversal from the root
    fn traverse_root(&self) -> std::result::Result<(Hash, TraversalState), MerkleProofError> {
        self.traverse(self.tree_height(), 0, TraversalState::default())
    }

    /// Check the partial tree against the header, reporting the first rule broken
    pub fn verify_merkle_tree(&self) -> std::result::Result<Hash, MerkleProofError> {
        if self.hashes.len() as u64 > self.num_transactions as u64 {
            return Err(MerkleProofError::TooManyHashes {
                hashes: self.hashes.len(),
                transactions: self.num_transactions,
            });
        }
        if self.flags.len() * 8 < self.hashes.len() {
            return Err(MerkleProofError::NotEnoughFlagBits {
                flag_bits: self.flags.len() * 8,
                hashes: self.hashes.len(),
            });
        }

        let (root, state) = self.traverse_root()?;
        if state.hashes_used != self.hashes.len() {
            return Err(MerkleProofError::UnusedHashes {
                used: state.hashes_used,
                total: self.hashes.len(),
            });
        }
        if root != self.header.merkle_root {
            return Err(MerkleProofError::RootMismatch);
        }
        Ok(root)
    }

    pub fn valid_merkle_tree(&self) -> bool {
        match self.verify_merkle_tree() {
            Ok(_) => true,
            Err(reason) => {
                trace!(%reason, "merkle block rejected");
                false
            }
        }
    }

    /// Matched transaction hashes in wire byte order; empty if traversal fails
    pub fn matched_hashes(&self) -> Vec<Hash> {
        self.traverse_root()
            .map(|(_, state)| state.matched)
            .unwrap_or_default()
    }

    /// Matched transaction ids in display order
    pub fn matched_transaction_ids(&self) -> Vec<String> {
        self.matched_hashes()
            .iter()
            .map(crate::transaction::hash_to_display_hex)
            .collect()
    }

    /// True if the transaction is among the matched leaves
    ///
    /// Does not check the proof itself; pair with [`valid_merkle_tree`](Self::valid_merkle_tree).
    pub fn has_transaction(&self, tx: TxRef) -> bool {
        let wanted = match tx {
            TxRef::Transaction(tx) => transaction_id(tx),
            TxRef::Id(id) => match hex::decode(id).map(|bytes| <Hash>::try_from(bytes.as_slice())) {
                Ok(Ok(hash)) => hash,
                _ => return false,
            },
            TxRef::DisplayId(id) => match hash_from_display_hex(id) {
                Ok(hash) => hash,
                Err(_) => return false,
            },
        };
        self.matched_hashes().contains(&wanted)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = serialize_header(&self.header);
        out.extend_from_slice(&self.num_transactions.to_le_bytes());
        out.extend_from_slice(&encode_varint(self.hashes.len() as u64));
        for hash in &self.hashes {
            out.extend_from_slice(hash);
        }
        out.extend_from_slice(&encode_varint(self.flags.len() as u64));
        out.extend_from_slice(&self.flags);
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ConsensusError::Serialization(
                "no merkleblock data received".to_string(),
            ));
        }
        let mut reader = Reader::new(data);
        let header = read_header(&mut reader)?;
        let num_transactions = reader.read_u32_le()?;

        let hash_count = reader.read_varint()?;
        let mut hashes = Vec::new();
        for _ in 0..hash_count {
            hashes.push(reader.read_hash()?);
        }

        let flags = reader.read_var_bytes()?.to_vec();

        if !reader.is_finished() {
            return Err(ConsensusError::Serialization(format!(
                "{} trailing bytes after merkleblock",
                reader.remaining()
            )));
        }

        Ok(MerkleBlock {
            header,
            num_transactions,
            hashes,
            flags,
        })
    }

    pub fn to_object(&self) -> MerkleBlockObject {
        MerkleBlockObject {
            header: header_to_object(&self.header),
            num_transactions: self.num_transactions,
            hashes: self.hashes.iter().map(hex::encode).collect(),
            flags: self.flags.clone(),
        }
    }

    pub fn from_object(obj: &MerkleBlockObject) -> Result<Self> {
        let hashes = obj
            .hashes
            .iter()
            .map(|h| {
                let bytes = hex::decode(h)?;
                <Hash>::try_from(bytes.as_slice()).map_err(|_| ConsensusError::InvalidLength {
                    expected: 32,
                    actual: bytes.len(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MerkleBlock {
            header: header_from_object(&obj.header)?,
            num_transactions: obj.num_transactions,
            hashes,
            flags: obj.flags.clone(),
        })
    }
}

impl From<MerkleBlock> for MerkleBlockObject {
    fn from(block: MerkleBlock) -> Self {
        block.to_object()
    }
}

impl TryFrom<MerkleBlockObject> for MerkleBlock {
    type Error = ConsensusError;

    fn try_from(obj: MerkleBlockObject) -> Result<Self> {
        MerkleBlock::from_object(&obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> Hash {
        [n; 32]
    }

    fn parent(left: &Hash, right: &Hash) -> Hash {
        let mut concat = Vec::with_capacity(64);
        concat.extend_from_slice(left);
        concat.extend_from_slice(right);
        sha256d(&concat)
    }

    fn header_with_root(root: Hash) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: [0; 32],
            merkle_root: root,
            timestamp: 0,
            bits: 0x1d00ffff,
            nonce: 0,
        }
    }

    /// Three leaves, the middle one matched:
    /// root(1) -> left(1) -> [a(0), b(1)], right(0)
    fn three_tx_block() -> MerkleBlock {
        let (a, b, c) = (leaf(1), leaf(2), leaf(3));
        let left = parent(&a, &b);
        let right = parent(&c, &c);
        let root = parent(&left, &right);
        // Flag bits, LSB first: root=1, left=1, a=0, b=1, right=0
        let flags = vec![0b0000_1011];
        MerkleBlock::new(header_with_root(root), 3, vec![a, b, right], flags)
    }

    #[test]
    fn test_tree_shape() {
        let block = three_tx_block();
        assert_eq!(block.tree_width(0), 3);
        assert_eq!(block.tree_width(1), 2);
        assert_eq!(block.tree_width(2), 1);
        assert_eq!(block.tree_height(), 2);
    }

    #[test]
    fn test_single_transaction_block() {
        let tx = leaf(7);
        let block = MerkleBlock::new(header_with_root(tx), 1, vec![tx], vec![0x01]);
        assert_eq!(block.tree_height(), 0);
        assert!(block.valid_merkle_tree());
        assert_eq!(block.matched_hashes(), vec![tx]);
    }

    #[test]
    fn test_three_transaction_proof() {
        let block = three_tx_block();
        assert_eq!(block.verify_merkle_tree(), Ok(block.header.merkle_root));
        assert!(block.valid_merkle_tree());
        assert_eq!(block.matched_hashes(), vec![leaf(2)]);
    }

    #[test]
    fn test_traverse_reports_state() {
        let block = three_tx_block();
        let (root, state) = block.traverse(2, 0, TraversalState::default()).unwrap();
        assert_eq!(root, block.header.merkle_root);
        assert_eq!(state.flag_bits_used, 5);
        assert_eq!(state.hashes_used, 3);
    }

    #[test]
    fn test_root_mismatch() {
        let mut block = three_tx_block();
        block.header.merkle_root = [0xee; 32];
        assert_eq!(block.verify_merkle_tree(), Err(MerkleProofError::RootMismatch));
        assert!(!block.valid_merkle_tree());
    }

    #[test]
    fn test_too_many_hashes() {
        let mut block = three_tx_block();
        block.hashes.push(leaf(9));
        block.hashes.push(leaf(9));
        assert!(matches!(
            block.verify_merkle_tree(),
            Err(MerkleProofError::TooManyHashes { .. })
        ));
    }

    #[test]
    fn test_unused_hashes() {
        let mut block = three_tx_block();
        block.num_transactions = 4;
        block.hashes.push(leaf(9));
        assert_eq!(
            block.verify_merkle_tree(),
            Err(MerkleProofError::UnusedHashes { used: 3, total: 4 })
        );
        assert!(!block.valid_merkle_tree());
    }

    #[test]
    fn test_flag_truncation_invalidates() {
        let tx = leaf(7);
        let block = MerkleBlock::new(header_with_root(tx), 1, vec![tx], vec![]);
        assert!(matches!(
            block.verify_merkle_tree(),
            Err(MerkleProofError::NotEnoughFlagBits { .. })
        ));
        assert!(!block.valid_merkle_tree());
        assert!(block.matched_hashes().is_empty());
    }

    #[test]
    fn test_flags_exhausted_mid_traversal() {
        // Height 4 tree: descending on every bit runs out after the third leaf
        let block = MerkleBlock::new(header_with_root([0; 32]), 9, vec![leaf(1); 8], vec![0xff]);
        assert_eq!(block.verify_merkle_tree(), Err(MerkleProofError::FlagBitsExhausted));
    }

    #[test]
    fn test_hashes_exhausted() {
        let mut block = three_tx_block();
        block.hashes.truncate(2);
        assert_eq!(block.verify_merkle_tree(), Err(MerkleProofError::HashesExhausted));
    }

    #[test]
    fn test_has_transaction_by_id() {
        let block = three_tx_block();
        let obj = block.to_object();
        // Object-form hashes are looked up as they are stored
        assert!(block.has_transaction(TxRef::Id(&obj.hashes[1])));
        assert!(!block.has_transaction(TxRef::Id(&obj.hashes[0])));
        assert!(!block.has_transaction(TxRef::Id("not hex")));
        assert!(!block.has_transaction(TxRef::Id("abcd")));
    }

    #[test]
    fn test_has_transaction_by_display_id() {
        let mut display = [0u8; 32];
        display[..16].copy_from_slice(&[2; 16]);
        display[16..].copy_from_slice(&[3; 16]);
        let mut wire = display;
        wire.reverse();
        let block = MerkleBlock::new(header_with_root(wire), 1, vec![wire], vec![0x01]);
        assert!(block.valid_merkle_tree());
        assert!(block.has_transaction(TxRef::DisplayId(&hex::encode(display))));
        assert!(!block.has_transaction(TxRef::Id(&hex::encode(display))));
        assert!(block.has_transaction(TxRef::Id(&hex::encode(wire))));
        assert_eq!(block.matched_transaction_ids(), vec![hex::encode(display)]);
    }

    #[test]
    fn test_accessors() {
        let block = three_tx_block();
        assert_eq!(block.num_transactions(), 3);
        assert_eq!(block.hashes().len(), 3);
        assert_eq!(block.flags(), &[0b0000_1011]);
        assert_eq!(block.header().merkle_root, block.header.merkle_root);
    }

    #[test]
    fn test_has_transaction_by_transaction() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![],
            lock_time: 0,
        };
        let id = transaction_id(&tx);
        let block = MerkleBlock::new(header_with_root(id), 1, vec![id], vec![0x01]);
        assert!(block.has_transaction(TxRef::Transaction(&tx)));
    }

    #[test]
    fn test_wire_round_trip() {
        let block = three_tx_block();
        let bytes = block.to_bytes();
        assert_eq!(bytes.len(), 80 + 4 + 1 + 3 * 32 + 1 + 1);
        assert_eq!(MerkleBlock::from_bytes(&bytes).unwrap(), block);
    }

    #[test]
    fn test_from_bytes_errors() {
        assert!(MerkleBlock::from_bytes(&[]).is_err());
        let bytes = three_tx_block().to_bytes();
        assert!(MerkleBlock::from_bytes(&bytes[..bytes.len() - 2]).is_err());
    }

    #[test]
    fn test_object_form() {
        let block = three_tx_block();
        let obj = block.to_object();
        assert_eq!(obj.hashes[0], hex::encode(leaf(1)));
        assert_eq!(MerkleBlock::from_object(&obj).unwrap(), block);

        let json = serde_json::to_string(&block).unwrap();
        let parsed: MerkleBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn test_object_bad_hash_length() {
        let mut obj = three_tx_block().to_object();
        obj.hashes[0] = "abcd".to_string();
        assert!(matches!(
            MerkleBlock::from_object(&obj),
            Err(ConsensusError::InvalidLength { expected: 32, actual: 2 })
        ));
    }
}
