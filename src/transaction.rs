//! Transaction and output wire encoding, ids and value checks

use crate::constants::*;
use crate::encode::{encode_varint, write_var_bytes, Reader};
use crate::error::{ConsensusError, Result};
use crate::hash::sha256d;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Serialize one output: u64 LE value, varint script length, script bytes
pub fn serialize_output(output: &TransactionOutput) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + output.script_pubkey.len());
    out.extend_from_slice(&output.value.to_le_bytes());
    write_var_bytes(&mut out, &output.script_pubkey);
    out
}

pub fn read_output(reader: &mut Reader) -> Result<TransactionOutput> {
    let value = reader.read_u64_le()?;
    let script_pubkey = reader.read_var_bytes()?.to_vec();
    Ok(TransactionOutput {
        value,
        script_pubkey,
    })
}

pub fn deserialize_output(data: &[u8]) -> Result<TransactionOutput> {
    let mut reader = Reader::new(data);
    let output = read_output(&mut reader)?;
    ensure_consumed(&reader)?;
    Ok(output)
}

fn write_input(out: &mut Vec<u8>, input: &TransactionInput) {
    out.extend_from_slice(&input.prevout.hash);
    out.extend_from_slice(&input.prevout.index.to_le_bytes());
    write_var_bytes(out, &input.script_sig);
    out.extend_from_slice(&input.sequence.to_le_bytes());
}

fn read_input(reader: &mut Reader) -> Result<TransactionInput> {
    let hash = reader.read_hash()?;
    let index = reader.read_u32_le()?;
    let script_sig = reader.read_var_bytes()?.to_vec();
    let sequence = reader.read_u32_le()?;
    Ok(TransactionInput {
        prevout: OutPoint { hash, index },
        script_sig,
        sequence,
    })
}

/// Legacy (non-witness) transaction serialization
pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());

    out.extend_from_slice(&encode_varint(tx.inputs.len() as u64));
    for input in &tx.inputs {
        write_input(&mut out, input);
    }

    out.extend_from_slice(&encode_varint(tx.outputs.len() as u64));
    for output in &tx.outputs {
        out.extend_from_slice(&serialize_output(output));
    }

    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

pub fn deserialize_transaction(data: &[u8]) -> Result<Transaction> {
    let mut reader = Reader::new(data);
    let version = reader.read_u32_le()?;

    let input_count = reader.read_varint()?;
    let mut inputs = Vec::new();
    for _ in 0..input_count {
        inputs.push(read_input(&mut reader)?);
    }

    let output_count = reader.read_varint()?;
    let mut outputs = Vec::new();
    for _ in 0..output_count {
        outputs.push(read_output(&mut reader)?);
    }

    let lock_time = reader.read_u32_le()?;
    ensure_consumed(&reader)?;

    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

/// Transaction id in internal byte order: SHA256d(serialized tx)
pub fn transaction_id(tx: &Transaction) -> Hash {
    sha256d(&serialize_transaction(tx))
}

/// Display-order (byte-reversed) hex id, as block explorers show it
pub fn transaction_id_hex(tx: &Transaction) -> String {
    hash_to_display_hex(&transaction_id(tx))
}

pub fn hash_to_display_hex(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

/// Parse a display-order hex id back into internal byte order
pub fn hash_from_display_hex(s: &str) -> Result<Hash> {
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(ConsensusError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    hash.reverse();
    Ok(hash)
}

/// Every output value must lie in [0, MAX_MONEY] and so must their sum
pub fn check_output_values(tx: &Transaction) -> Result<()> {
    let mut total: u64 = 0;
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value > MAX_MONEY {
            return Err(ConsensusError::MalformedInput(format!(
                "Invalid output value {} at index {}",
                output.value, i
            )));
        }
        total = total
            .checked_add(output.value)
            .filter(|t| *t <= MAX_MONEY)
            .ok_or_else(|| {
                ConsensusError::MalformedInput(format!("Output total exceeds {}", MAX_MONEY))
            })?;
    }
    Ok(())
}

/// Plain-object form of an output: amount plus hex script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputObject {
    pub satoshis: u64,
    pub script: String,
}

impl From<&TransactionOutput> for OutputObject {
    fn from(output: &TransactionOutput) -> Self {
        Self {
            satoshis: output.value,
            script: hex::encode(&output.script_pubkey),
        }
    }
}

impl TryFrom<&OutputObject> for TransactionOutput {
    type Error = ConsensusError;

    fn try_from(obj: &OutputObject) -> Result<Self> {
        Ok(TransactionOutput {
            value: obj.satoshis,
            script_pubkey: hex::decode(&obj.script)?,
        })
    }
}

fn ensure_consumed(reader: &Reader) -> Result<()> {
    if !reader.is_finished() {
        return Err(ConsensusError::Serialization(format!(
            "{} trailing bytes",
            reader.remaining()
        )));
    }
    Ok(())
}
