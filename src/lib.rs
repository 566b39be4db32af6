//! # Consensus-Primitives
//!
//! Address encoding, P2SH multisignature input assembly and Merkle block
//! verification for Bitcoin-family networks.
//!
//! ## Architecture
//!
//! The crate is layered, leaves first:
//! - Hashing, Base58Check and wire encoding
//! - Network profiles and the registry that resolves them
//! - Keys, scripts, transactions and signature hashing
//! - Addresses, multisig inputs and Merkle blocks
//!
//! ## Design Principles
//!
//! 1. **Explicit Registry**: every operation that depends on network profiles takes
//!    a `NetworkRegistry`; `NetworkRegistry::global()` is the process-wide default
//! 2. **Immutable Values**: addresses and Merkle blocks never change after construction
//! 3. **Exact Version Pinning**: all consensus-critical dependencies pinned to exact versions
//! 4. **Proofs Are Answers**: an invalid Merkle proof is a `false`, not an error
//!
//! ## Usage
//!
//! ```rust
//! use consensus_primitives::ConsensusPrimitives;
//!
//! let primitives = ConsensusPrimitives::new();
//! let address = primitives
//!     .address_from_string("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", None, None)
//!     .unwrap();
//! assert!(address.is_pay_to_public_key_hash());
//! assert_eq!(address.network().name, "livenet");
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod hash;
pub mod base58check;
pub mod encode;
pub mod network;
pub mod key;
pub mod script;
pub mod transaction;
pub mod sighash;
pub mod address;
pub mod multisig;
pub mod block;
pub mod merkleblock;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ConsensusError, ErrorKind, MerkleProofError, Result};
pub use address::{Address, AddressInput, AddressObject, AddressType};
pub use key::{PrivateKey, PublicKey};
pub use merkleblock::{MerkleBlock, TxRef};
pub use multisig::{MultiSigScriptHashInput, SigningState};
pub use network::{Network, NetworkField, NetworkParams, NetworkRegistry};
pub use script::Script;
pub use sighash::TransactionSignature;

/// Entry points bound to one network registry
///
/// # Examples
///
/// ```
/// use consensus_primitives::{ConsensusPrimitives, NetworkRegistry};
///
/// // A private registry keeps custom networks out of the process-wide one
/// let registry = NetworkRegistry::new();
/// registry.set_default("testnet").unwrap();
///
/// let primitives = ConsensusPrimitives::with_registry(&registry);
/// let address = primitives.address_from_public_key_hash(&[0u8; 20], None).unwrap();
/// assert_eq!(address.network().name, "testnet");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ConsensusPrimitives<'r> {
    registry: &'r NetworkRegistry,
}

impl Default for ConsensusPrimitives<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsensusPrimitives<'static> {
    /// Use the process-wide registry
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_primitives::ConsensusPrimitives;
    ///
    /// let primitives = ConsensusPrimitives::new();
    /// assert!(primitives.registry().get("mainnet").is_some());
    /// ```
    pub fn new() -> Self {
        Self {
            registry: NetworkRegistry::global(),
        }
    }
}

impl<'r> ConsensusPrimitives<'r> {
    pub fn with_registry(registry: &'r NetworkRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r NetworkRegistry {
        self.registry
    }

    /// Parse a Base58Check address, optionally asserting its network and type
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_primitives::{ConsensusPrimitives, ErrorKind};
    ///
    /// let primitives = ConsensusPrimitives::new();
    /// let err = primitives
    ///     .address_from_string("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Some("testnet"), None)
    ///     .unwrap_err();
    /// assert_eq!(err.kind(), ErrorKind::Mismatch);
    /// ```
    pub fn address_from_string(
        &self,
        s: &str,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Result<Address> {
        Address::from_string(self.registry, s, network, address_type)
    }

    /// Build an address from any supported input
    pub fn address(
        &self,
        input: AddressInput,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Result<Address> {
        Address::new(self.registry, input, network, address_type)
    }

    /// P2PKH address of a public key
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_primitives::{ConsensusPrimitives, PublicKey};
    ///
    /// let primitives = ConsensusPrimitives::new();
    /// let key = PublicKey::from_hex(
    ///     "0250863ad64a87ae8a2fe83c1af1a8403cb53f53e486d8511dad8a04887e5b2352",
    /// ).unwrap();
    /// let address = primitives.address_from_public_key(&key, None).unwrap();
    /// assert_eq!(address.to_string(), "1PMycacnJaSqwwJqjawXBErnLsZ7RkXUAs");
    /// ```
    pub fn address_from_public_key(
        &self,
        public_key: &PublicKey,
        network: Option<&str>,
    ) -> Result<Address> {
        Address::from_public_key(self.registry, public_key, network)
    }

    pub fn address_from_public_key_hash(
        &self,
        hash: &Hash160,
        network: Option<&str>,
    ) -> Result<Address> {
        Address::from_public_key_hash(self.registry, hash, network)
    }

    pub fn address_from_script(&self, script: &Script, network: Option<&str>) -> Result<Address> {
        Address::from_script(self.registry, script, network)
    }

    /// P2SH address of an m-of-n multisig; key order does not matter
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_primitives::{ConsensusPrimitives, PrivateKey};
    ///
    /// let primitives = ConsensusPrimitives::new();
    /// let a = PrivateKey::from_slice(&[1u8; 32]).unwrap().public_key();
    /// let b = PrivateKey::from_slice(&[2u8; 32]).unwrap().public_key();
    ///
    /// let ab = primitives.create_multisig_address(&[a, b], 1, None).unwrap();
    /// let ba = primitives.create_multisig_address(&[b, a], 1, None).unwrap();
    /// assert_eq!(ab, ba);
    /// assert!(ab.is_pay_to_script_hash());
    /// ```
    pub fn create_multisig_address(
        &self,
        public_keys: &[PublicKey],
        threshold: usize,
        network: Option<&str>,
    ) -> Result<Address> {
        Address::create_multisig(self.registry, public_keys, threshold, network)
    }

    /// The error an address input would fail with, or `None` if it is valid
    pub fn address_validation_error(
        &self,
        input: AddressInput,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> Option<ConsensusError> {
        Address::validation_error(self.registry, input, network, address_type)
    }

    pub fn is_valid_address(
        &self,
        input: AddressInput,
        network: Option<&str>,
        address_type: Option<AddressType>,
    ) -> bool {
        Address::is_valid(self.registry, input, network, address_type)
    }

    /// Bind a multisig input to the P2SH output it spends
    pub fn multisig_input(
        &self,
        prevout: OutPoint,
        output: TransactionOutput,
        public_keys: &[PublicKey],
        threshold: usize,
    ) -> Result<MultiSigScriptHashInput> {
        MultiSigScriptHashInput::new(prevout, output, public_keys, threshold)
    }

    /// Decode a wire-format Merkle block
    pub fn parse_merkle_block(&self, data: &[u8]) -> Result<MerkleBlock> {
        MerkleBlock::from_bytes(data)
    }

    /// True if the block's partial tree proves its header's Merkle root
    pub fn verify_merkle_block(&self, block: &MerkleBlock) -> bool {
        block.valid_merkle_tree()
    }

    /// True if the proof is valid and it matches `tx`
    pub fn merkle_block_proves(&self, block: &MerkleBlock, tx: TxRef) -> bool {
        block.valid_merkle_tree() && block.has_transaction(tx)
    }

    /// Display-order transaction id
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_primitives::ConsensusPrimitives;
    /// use consensus_primitives::types::*;
    ///
    /// let primitives = ConsensusPrimitives::new();
    /// let tx = Transaction {
    ///     version: 1,
    ///     inputs: vec![],
    ///     outputs: vec![TransactionOutput {
    ///         value: 1000,
    ///         script_pubkey: vec![0x51],
    ///     }],
    ///     lock_time: 0,
    /// };
    /// assert_eq!(primitives.transaction_id(&tx).len(), 64);
    /// ```
    pub fn transaction_id(&self, tx: &Transaction) -> String {
        transaction::transaction_id_hex(tx)
    }
}
