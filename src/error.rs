//! Error types for address, script and multisig operations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Base58 decoding failed: {0}")]
    Base58(String),

    #[error("Checksum mismatch")]
    InvalidChecksum,

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Cannot derive address from script: {0}")]
    CantDeriveAddress(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("Precondition violated: {0}")]
    StatePrecondition(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Key error: {0}")]
    Key(String),
}

/// Coarse classification of a [`ConsensusError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Garbage in: wrong length, bad encoding, unknown shape
    Malformed,
    /// Well-formed data that belongs to a different network, type or output
    Mismatch,
    /// Operation not allowed in the object's current state
    Precondition,
    /// Cryptographic verification failed
    Signature,
}

impl ConsensusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsensusError::ProtocolMismatch(_) => ErrorKind::Mismatch,
            ConsensusError::StatePrecondition(_) => ErrorKind::Precondition,
            ConsensusError::InvalidSignature(_) => ErrorKind::Signature,
            _ => ErrorKind::Malformed,
        }
    }
}

impl From<secp256k1::Error> for ConsensusError {
    fn from(e: secp256k1::Error) -> Self {
        ConsensusError::Key(e.to_string())
    }
}

impl From<hex::FromHexError> for ConsensusError {
    fn from(e: hex::FromHexError) -> Self {
        ConsensusError::MalformedInput(format!("invalid hex: {}", e))
    }
}

impl From<serde_json::Error> for ConsensusError {
    fn from(e: serde_json::Error) -> Self {
        ConsensusError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Why a partial Merkle tree failed to verify
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MerkleProofError {
    #[error("{hashes} hashes for only {transactions} transactions")]
    TooManyHashes { hashes: usize, transactions: u32 },

    #[error("{flag_bits} flag bits cannot cover {hashes} hashes")]
    NotEnoughFlagBits { flag_bits: usize, hashes: usize },

    #[error("Flag bits exhausted during traversal")]
    FlagBitsExhausted,

    #[error("Hashes exhausted during traversal")]
    HashesExhausted,

    #[error("Only {used} of {total} hashes consumed")]
    UnusedHashes { used: usize, total: usize },

    #[error("Computed root does not match header merkle root")]
    RootMismatch,
}
