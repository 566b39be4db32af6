//! Legacy signature hash and ECDSA signing of transaction inputs
//!
//! The digest is SHA256d over a modified copy of the transaction: the signed
//! input carries the subscript, the other inputs carry empty scripts, and the
//! sighash type selects which inputs and outputs are committed to.

use crate::constants::*;
use crate::encode::{encode_varint, write_var_bytes};
use crate::error::{ConsensusError, Result};
use crate::hash::sha256d;
use crate::key::{PrivateKey, PublicKey};
use crate::script::Script;
use crate::transaction::{hash_from_display_hex, hash_to_display_hex};
use crate::types::*;
use secp256k1::ecdsa::Signature;
use serde::{Deserialize, Serialize};

/// Digest returned for SIGHASH_SINGLE without a matching output
const SIGHASH_SINGLE_BUG: Hash = [
    1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0,
];

/// Compute the legacy signature hash of `tx` for input `input_index`
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    subscript: &Script,
    sigtype: u8,
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(ConsensusError::MalformedInput(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        )));
    }

    let base_type = sigtype & 0x1f;
    let anyone_can_pay = sigtype & SIGHASH_ANYONECANPAY != 0;

    if base_type == SIGHASH_SINGLE && input_index >= tx.outputs.len() {
        return Ok(SIGHASH_SINGLE_BUG);
    }

    let mut preimage = Vec::new();
    preimage.extend_from_slice(&tx.version.to_le_bytes());

    // Inputs
    let signed: Vec<(usize, &TransactionInput)> = if anyone_can_pay {
        vec![(input_index, &tx.inputs[input_index])]
    } else {
        tx.inputs.iter().enumerate().collect()
    };
    preimage.extend_from_slice(&encode_varint(signed.len() as u64));
    for (i, input) in signed {
        preimage.extend_from_slice(&input.prevout.hash);
        preimage.extend_from_slice(&input.prevout.index.to_le_bytes());
        if i == input_index {
            write_var_bytes(&mut preimage, subscript.as_bytes());
        } else {
            preimage.push(0x00);
        }
        let sequence = match base_type {
            SIGHASH_NONE | SIGHASH_SINGLE if i != input_index => 0,
            _ => input.sequence,
        };
        preimage.extend_from_slice(&sequence.to_le_bytes());
    }

    // Outputs
    let output_count = match base_type {
        SIGHASH_NONE => 0,
        SIGHASH_SINGLE => input_index + 1,
        _ => tx.outputs.len(),
    };
    preimage.extend_from_slice(&encode_varint(output_count as u64));
    for (i, output) in tx.outputs.iter().take(output_count).enumerate() {
        if base_type == SIGHASH_SINGLE && i < input_index {
            // Blanked output: value -1, empty script
            preimage.extend_from_slice(&[0xff; 8]);
            preimage.push(0x00);
        } else {
            preimage.extend_from_slice(&output.value.to_le_bytes());
            write_var_bytes(&mut preimage, &output.script_pubkey);
        }
    }

    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&(sigtype as u32).to_le_bytes());

    Ok(sha256d(&preimage))
}

/// Sign input `input_index` of `tx` against `subscript`
pub fn sign(
    tx: &Transaction,
    private_key: &PrivateKey,
    sigtype: u8,
    input_index: usize,
    subscript: &Script,
) -> Result<Signature> {
    let digest = signature_hash(tx, input_index, subscript, sigtype)?;
    Ok(private_key.sign_digest(&digest))
}

/// Check `signature` by `public_key` over input `input_index`; false on any failure
pub fn verify(
    tx: &Transaction,
    signature: &Signature,
    public_key: &PublicKey,
    input_index: usize,
    subscript: &Script,
    sigtype: u8,
) -> bool {
    match signature_hash(tx, input_index, subscript, sigtype) {
        Ok(digest) => public_key.verify_digest(&digest, signature),
        Err(_) => false,
    }
}

/// A signature for one input, with the data needed to place and check it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSignature {
    pub public_key: PublicKey,
    /// Spent transaction id, internal byte order
    pub prev_tx_id: Hash,
    pub output_index: u32,
    pub input_index: usize,
    pub signature: Signature,
    pub sigtype: u8,
}

/// Plain-object form of [`TransactionSignature`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignatureObject {
    pub public_key: String,
    /// Display-order hex
    pub prev_tx_id: String,
    pub output_index: u32,
    pub input_index: usize,
    /// DER hex
    pub signature: String,
    pub sigtype: u8,
}

impl TransactionSignature {
    /// DER encoding followed by the sighash type byte, as pushed in scripts
    pub fn to_script_bytes(&self) -> ByteString {
        let mut bytes = self.signature.serialize_der().to_vec();
        bytes.push(self.sigtype);
        bytes
    }

    pub fn to_object(&self) -> TransactionSignatureObject {
        TransactionSignatureObject {
            public_key: self.public_key.to_string(),
            prev_tx_id: hash_to_display_hex(&self.prev_tx_id),
            output_index: self.output_index,
            input_index: self.input_index,
            signature: hex::encode(self.signature.serialize_der()),
            sigtype: self.sigtype,
        }
    }

    pub fn from_object(obj: &TransactionSignatureObject) -> Result<Self> {
        Ok(Self {
            public_key: PublicKey::from_hex(&obj.public_key)?,
            prev_tx_id: hash_from_display_hex(&obj.prev_tx_id)?,
            output_index: obj.output_index,
            input_index: obj.input_index,
            signature: Signature::from_der(&hex::decode(&obj.signature)?)?,
            sigtype: obj.sigtype,
        })
    }
}
