//! Base58 and Base58Check codecs
//!
//! Base58Check(payload) = Base58(payload ‖ SHA256d(payload)[0..4])

use crate::constants::CHECKSUM_SIZE;
use crate::error::{ConsensusError, Result};
use crate::hash::sha256d;

/// The Bitcoin base-58 alphabet
pub const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58 without checksum
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Decode a plain Base58 string
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| ConsensusError::Base58(e.to_string()))
}

/// True if every character belongs to the base-58 alphabet
pub fn valid_characters(encoded: &str) -> bool {
    encoded.chars().all(|c| ALPHABET.contains(c))
}

/// First four bytes of SHA256d(payload)
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let digest = sha256d(payload);
    let mut sum = [0u8; CHECKSUM_SIZE];
    sum.copy_from_slice(&digest[..CHECKSUM_SIZE]);
    sum
}

/// Base58Check encode
pub fn check_encode(payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_SIZE);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum(payload));
    encode(&data)
}

/// Base58Check decode, verifying and stripping the checksum
pub fn check_decode(encoded: &str) -> Result<Vec<u8>> {
    if !valid_characters(encoded) {
        return Err(ConsensusError::Base58(format!(
            "non-base58 characters in {:?}",
            encoded
        )));
    }
    let bytes = decode(encoded)?;
    if bytes.len() < CHECKSUM_SIZE {
        return Err(ConsensusError::Base58(format!(
            "input too short for checksum: {} bytes",
            bytes.len()
        )));
    }

    let (payload, sum) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
    if checksum(payload)[..] != sum[..] {
        return Err(ConsensusError::InvalidChecksum);
    }

    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUF: [u8; 7] = [0, 1, 2, 3, 253, 254, 255];
    const ENC: &str = "1W7N4RuG";

    #[test]
    fn test_encode_known_vector() {
        assert_eq!(encode(&BUF), ENC);
    }

    #[test]
    fn test_decode_known_vector() {
        assert_eq!(decode(ENC).unwrap(), BUF.to_vec());
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn test_leading_zeros_become_ones() {
        assert_eq!(encode(&[0, 0, 1]), "112");
    }

    #[test]
    fn test_valid_characters() {
        assert!(valid_characters(ALPHABET));
        assert!(!valid_characters("!@#%^$&*()\\"));
        // 0, O, I and l are excluded from the alphabet
        assert!(!valid_characters("0OIl"));
    }

    #[test]
    fn test_decode_invalid_character() {
        assert!(matches!(decode("0abc"), Err(ConsensusError::Base58(_))));
    }

    #[test]
    fn test_check_encode_address_vector() {
        let payload = hex::decode("00010966776006953d5567439e5e39f86a0d273bee").unwrap();
        assert_eq!(check_encode(&payload), "16UwLL9Risc3QfPqBUvKofHmBQ7wMtjvM");
    }

    #[test]
    fn test_check_decode_address_vector() {
        let payload = check_decode("16UwLL9Risc3QfPqBUvKofHmBQ7wMtjvM").unwrap();
        assert_eq!(hex::encode(payload), "00010966776006953d5567439e5e39f86a0d273bee");
    }

    #[test]
    fn test_check_decode_bad_checksum() {
        // Last character altered
        let result = check_decode("16UwLL9Risc3QfPqBUvKofHmBQ7wMtjvN");
        assert_eq!(result, Err(ConsensusError::InvalidChecksum));
    }

    #[test]
    fn test_check_decode_rejects_foreign_characters() {
        let err = check_decode("16UwLL9Risc3QfPqBUvKofHmBQ7wMtj0M").unwrap_err();
        assert!(matches!(&err, ConsensusError::Base58(msg) if msg.contains("non-base58")));
    }

    #[test]
    fn test_check_decode_too_short() {
        let short = encode(&[1, 2, 3]);
        assert!(matches!(check_decode(&short), Err(ConsensusError::Base58(_))));
    }
}
