//! Protocol constants

/// Maximum money supply: 21,000,000 coins in satoshis
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Length of an address payload hash
pub const HASH160_SIZE: usize = 20;

/// Length of a versioned address buffer: version byte + hash
pub const ADDRESS_BUFFER_SIZE: usize = 1 + HASH160_SIZE;

/// Length of the Base58Check checksum suffix
pub const CHECKSUM_SIZE: usize = 4;

/// Serialized block header size
pub const BLOCK_HEADER_SIZE: usize = 80;

/// Largest key count a small-integer opcode can express in a multisig script
pub const MAX_MULTISIG_KEYS: usize = 16;

// Signature hash types
pub const SIGHASH_ALL: u8 = 0x01;
pub const SIGHASH_NONE: u8 = 0x02;
pub const SIGHASH_SINGLE: u8 = 0x03;
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

// Size estimation for P2SH multisig inputs
/// serialized size (<=3) + OP_0 .. N .. M OP_CHECKMULTISIG
pub const MULTISIG_OPCODES_SIZE: usize = 7;
/// size (1) + DER (<=72) + sighash (1)
pub const MULTISIG_SIGNATURE_SIZE: usize = 74;
/// size (1) + compressed key (33)
pub const MULTISIG_PUBKEY_SIZE: usize = 34;

// Regtest overrides applied to the test network
pub const REGTEST_MAGIC: [u8; 4] = [0xfa, 0xbf, 0xb5, 0xda];
pub const REGTEST_PORT: u16 = 18444;

// Test network values restored when regtest is disabled
pub const TESTNET_MAGIC: [u8; 4] = [0x0b, 0x11, 0x09, 0x07];
pub const TESTNET_PORT: u16 = 18333;
pub const TESTNET_DNS_SEEDS: &[&str] = &["192.168.0.1"];
