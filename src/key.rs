//! secp256k1 key wrappers that remember their serialization form

use crate::error::{ConsensusError, Result};
use crate::types::Hash;
use secp256k1::{ecdsa::Signature, All, Message, Secp256k1, SecretKey};
use std::fmt;
use std::sync::OnceLock;

static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();

/// Shared signing/verification context
pub(crate) fn secp() -> &'static Secp256k1<All> {
    SECP.get_or_init(Secp256k1::new)
}

/// Public key with its compressed/uncompressed encoding
///
/// The hex form of the encoded bytes is the key's identity: it orders keys in
/// multisig scripts and matches signatures to slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
    compressed: bool,
}

impl PublicKey {
    pub fn new(inner: secp256k1::PublicKey, compressed: bool) -> Self {
        Self { inner, compressed }
    }

    /// Parse a 33-byte compressed or 65-byte uncompressed key
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let inner = secp256k1::PublicKey::from_slice(bytes)?;
        Ok(Self {
            inner,
            compressed: bytes.len() == 33,
        })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(s)?)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        if self.compressed {
            self.inner.serialize().to_vec()
        } else {
            self.inner.serialize_uncompressed().to_vec()
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn inner(&self) -> &secp256k1::PublicKey {
        &self.inner
    }

    /// Verify an ECDSA signature over a 32-byte digest
    pub fn verify_digest(&self, digest: &Hash, signature: &Signature) -> bool {
        let message = Message::from_digest(*digest);
        secp().verify_ecdsa(&message, signature, &self.inner).is_ok()
    }

    /// True if the bytes look like an encoded public key (used by script shape detection)
    pub fn is_valid_encoding(bytes: &[u8]) -> bool {
        match bytes.len() {
            33 => bytes[0] == 0x02 || bytes[0] == 0x03,
            65 => bytes[0] == 0x04,
            _ => false,
        }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

/// Private key; `compressed` selects the encoding of the derived public key
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    inner: SecretKey,
    compressed: bool,
}

impl PrivateKey {
    pub fn new(inner: SecretKey, compressed: bool) -> Self {
        Self { inner, compressed }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(ConsensusError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            inner: SecretKey::from_slice(bytes)?,
            compressed: true,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(
            secp256k1::PublicKey::from_secret_key(secp(), &self.inner),
            self.compressed,
        )
    }

    /// Low-S ECDSA signature over a 32-byte digest
    pub fn sign_digest(&self, digest: &Hash) -> Signature {
        let message = Message::from_digest(*digest);
        secp().sign_ecdsa(&message, &self.inner)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Public key for secret key 0x00..01 is the generator point G
    const G_COMPRESSED: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn one() -> PrivateKey {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        PrivateKey::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_public_key_of_one_is_generator() {
        assert_eq!(one().public_key().to_string(), G_COMPRESSED);
    }

    #[test]
    fn test_uncompressed_round_trip() {
        let key = PrivateKey::new(*one().inner_secret(), false).public_key();
        let bytes = key.to_bytes();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 0x04);
        let parsed = PublicKey::from_slice(&bytes).unwrap();
        assert!(!parsed.is_compressed());
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_from_hex() {
        let key = PublicKey::from_hex(G_COMPRESSED).unwrap();
        assert!(key.is_compressed());
        assert_eq!(key.to_bytes().len(), 33);
        assert!(PublicKey::from_hex("zz").is_err());
        assert!(PublicKey::from_hex("02").is_err());
    }

    #[test]
    fn test_private_key_wrong_length() {
        let result = PrivateKey::from_slice(&[1u8; 31]);
        assert_eq!(result, Err(ConsensusError::InvalidLength { expected: 32, actual: 31 }));
    }

    #[test]
    fn test_private_key_zero_rejected() {
        assert!(PrivateKey::from_slice(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_sign_and_verify_digest() {
        let key = one();
        let digest = crate::hash::sha256d(b"digest");
        let signature = key.sign_digest(&digest);
        assert!(key.public_key().verify_digest(&digest, &signature));

        let other = crate::hash::sha256d(b"other");
        assert!(!key.public_key().verify_digest(&other, &signature));
    }

    #[test]
    fn test_valid_encoding_shapes() {
        assert!(PublicKey::is_valid_encoding(&[0x02; 33]));
        assert!(PublicKey::is_valid_encoding(&[0x04; 65]));
        assert!(!PublicKey::is_valid_encoding(&[0x04; 33]));
        assert!(!PublicKey::is_valid_encoding(&[0x02; 20]));
    }

    impl PrivateKey {
        fn inner_secret(&self) -> &SecretKey {
            &self.inner
        }
    }
}
