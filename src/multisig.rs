//! Threshold signature collection for one P2SH multisig input
//!
//! The input is bound to the output it spends and to a sorted set of public
//! keys. Each key owns a fixed signature slot; the unlocking script is rebuilt
//! from the filled slots, in slot order, after every change.

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use crate::key::{PrivateKey, PublicKey};
use crate::script::Script;
use crate::sighash::{self, TransactionSignature, TransactionSignatureObject};
use crate::transaction::{hash_from_display_hex, hash_to_display_hex, OutputObject};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Progress towards the signature threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Unsigned,
    Partial,
    FullySigned,
}

/// P2SH multisig input under construction
#[derive(Debug, Clone)]
pub struct MultiSigScriptHashInput {
    prevout: OutPoint,
    output: TransactionOutput,
    sequence: u32,
    public_keys: Vec<PublicKey>,
    /// Hex identity of each key to its slot
    public_key_index: HashMap<String, usize>,
    threshold: usize,
    redeem_script: Script,
    signatures: Vec<Option<TransactionSignature>>,
    script: Script,
}

/// Plain-object form of [`MultiSigScriptHashInput`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigInputObject {
    /// Display-order hex
    pub prev_tx_id: String,
    pub output_index: u32,
    pub sequence_number: u32,
    pub script: String,
    pub output: OutputObject,
    pub threshold: usize,
    pub public_keys: Vec<String>,
    pub signatures: Vec<Option<TransactionSignatureObject>>,
}

impl MultiSigScriptHashInput {
    /// Bind a new input spending `output` at `prevout`
    ///
    /// Fails with `ProtocolMismatch` when the keys and threshold do not hash to
    /// the output's P2SH script.
    pub fn new(
        prevout: OutPoint,
        output: TransactionOutput,
        public_keys: &[PublicKey],
        threshold: usize,
    ) -> Result<Self> {
        let mut sorted = public_keys.to_vec();
        sorted.sort_by_key(|k| k.to_string());

        let mut public_key_index = HashMap::with_capacity(sorted.len());
        for (slot, key) in sorted.iter().enumerate() {
            if public_key_index.insert(key.to_string(), slot).is_some() {
                return Err(ConsensusError::MalformedInput(format!(
                    "duplicate public key {}",
                    key
                )));
            }
        }

        let redeem_script = Script::build_multisig_out(&sorted, threshold)?;
        let expected = Script::build_script_hash_out(&redeem_script);
        if expected.as_bytes() != output.script_pubkey.as_slice() {
            warn!(
                expected = %hex::encode(expected.as_bytes()),
                actual = %hex::encode(&output.script_pubkey),
                "redeem script does not match bound output"
            );
            return Err(ConsensusError::ProtocolMismatch(
                "provided public keys don't hash to the provided output".to_string(),
            ));
        }

        let mut input = MultiSigScriptHashInput {
            prevout,
            output,
            sequence: SEQUENCE_FINAL,
            signatures: vec![None; sorted.len()],
            public_keys: sorted,
            public_key_index,
            threshold,
            redeem_script,
            script: Script::new(),
        };
        input.update_script()?;
        Ok(input)
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Signatures `private_key` can contribute for input `index` of `tx`
    ///
    /// Empty when the key is not bound to this input.
    pub fn get_signatures(
        &self,
        tx: &Transaction,
        private_key: &PrivateKey,
        index: usize,
        sigtype: u8,
    ) -> Result<Vec<TransactionSignature>> {
        let public_key = private_key.public_key();
        let identity = public_key.to_string();

        let mut results = Vec::new();
        for key in &self.public_keys {
            if key.to_string() == identity {
                results.push(TransactionSignature {
                    public_key: *key,
                    prev_tx_id: self.prevout.hash,
                    output_index: self.prevout.index,
                    input_index: index,
                    signature: sighash::sign(tx, private_key, sigtype, index, &self.redeem_script)?,
                    sigtype,
                });
            }
        }
        Ok(results)
    }

    /// Store a verified signature in its key's slot and rebuild the script
    ///
    /// Nothing changes when this fails.
    pub fn add_signature(&mut self, tx: &Transaction, signature: TransactionSignature) -> Result<()> {
        if self.is_fully_signed() {
            warn!(threshold = self.threshold, "signature rejected: already fully signed");
            return Err(ConsensusError::StatePrecondition(
                "all needed signatures have already been added".to_string(),
            ));
        }

        let identity = signature.public_key.to_string();
        let Some(&slot) = self.public_key_index.get(&identity) else {
            warn!(public_key = %identity, "signature rejected: no matching public key");
            return Err(ConsensusError::StatePrecondition(format!(
                "signature has no matching public key: {}",
                identity
            )));
        };

        if !self.is_valid_signature(tx, &signature) {
            warn!(slot, public_key = %identity, "signature rejected: verification failed");
            return Err(ConsensusError::InvalidSignature(format!(
                "signature by {} does not verify for input {}",
                identity, signature.input_index
            )));
        }

        let previous = self.signatures[slot].replace(signature);
        if let Err(e) = self.update_script() {
            self.signatures[slot] = previous;
            return Err(e);
        }
        debug!(slot, count = self.count_signatures(), threshold = self.threshold, "signature added");
        Ok(())
    }

    fn update_script(&mut self) -> Result<()> {
        let signatures: Vec<ByteString> = self
            .signatures
            .iter()
            .flatten()
            .map(TransactionSignature::to_script_bytes)
            .collect();
        self.script = Script::build_p2sh_multisig_in(
            &self.public_keys,
            self.threshold,
            &signatures,
            Some(&self.redeem_script),
        )?;
        Ok(())
    }

    pub fn clear_signatures(&mut self) -> Result<()> {
        self.signatures = vec![None; self.public_keys.len()];
        self.update_script()
    }

    pub fn count_signatures(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    pub fn count_missing_signatures(&self) -> usize {
        self.threshold.saturating_sub(self.count_signatures())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.count_signatures() >= self.threshold
    }

    pub fn signing_state(&self) -> SigningState {
        match self.count_signatures() {
            0 => SigningState::Unsigned,
            n if n >= self.threshold => SigningState::FullySigned,
            _ => SigningState::Partial,
        }
    }

    /// Bound keys whose slot is still empty, in slot order
    pub fn public_keys_without_signature(&self) -> Vec<&PublicKey> {
        self.public_keys
            .iter()
            .zip(&self.signatures)
            .filter(|(_, sig)| sig.is_none())
            .map(|(key, _)| key)
            .collect()
    }

    /// Verify `signature` against the redeem script; never fails
    pub fn is_valid_signature(&self, tx: &Transaction, signature: &TransactionSignature) -> bool {
        sighash::verify(
            tx,
            &signature.signature,
            &signature.public_key,
            signature.input_index,
            &self.redeem_script,
            signature.sigtype,
        )
    }

    /// Upper bound on the unlocking script size in bytes
    pub fn estimate_size(&self) -> usize {
        MULTISIG_OPCODES_SIZE
            + self.threshold * MULTISIG_SIGNATURE_SIZE
            + self.public_keys.len() * MULTISIG_PUBKEY_SIZE
    }

    /// The input as it would appear in the spending transaction
    pub fn to_transaction_input(&self) -> TransactionInput {
        TransactionInput {
            prevout: self.prevout.clone(),
            script_sig: self.script.to_bytes(),
            sequence: self.sequence,
        }
    }

    pub fn prevout(&self) -> &OutPoint {
        &self.prevout
    }

    pub fn output(&self) -> &TransactionOutput {
        &self.output
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn redeem_script(&self) -> &Script {
        &self.redeem_script
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn signatures(&self) -> &[Option<TransactionSignature>] {
        &self.signatures
    }

    pub fn to_object(&self) -> MultiSigInputObject {
        MultiSigInputObject {
            prev_tx_id: hash_to_display_hex(&self.prevout.hash),
            output_index: self.prevout.index,
            sequence_number: self.sequence,
            script: hex::encode(self.script.as_bytes()),
            output: OutputObject::from(&self.output),
            threshold: self.threshold,
            public_keys: self.public_keys.iter().map(|k| k.to_string()).collect(),
            signatures: self
                .signatures
                .iter()
                .map(|s| s.as_ref().map(TransactionSignature::to_object))
                .collect(),
        }
    }

    /// Rebuild an input, restoring its signature slots
    ///
    /// Restored signatures are not re-verified; each must belong to the key of
    /// the slot it occupies.
    pub fn from_object(obj: &MultiSigInputObject) -> Result<Self> {
        let prevout = OutPoint {
            hash: hash_from_display_hex(&obj.prev_tx_id)?,
            index: obj.output_index,
        };
        let output = TransactionOutput::try_from(&obj.output)?;
        let public_keys = obj
            .public_keys
            .iter()
            .map(|k| PublicKey::from_hex(k))
            .collect::<Result<Vec<_>>>()?;

        let mut input = Self::new(prevout, output, &public_keys, obj.threshold)?
            .with_sequence(obj.sequence_number);

        if obj.signatures.len() != input.public_keys.len() {
            return Err(ConsensusError::MalformedInput(format!(
                "expected {} signature slots, got {}",
                input.public_keys.len(),
                obj.signatures.len()
            )));
        }

        for (slot, entry) in obj.signatures.iter().enumerate() {
            let Some(entry) = entry else { continue };
            let signature = TransactionSignature::from_object(entry)?;
            if signature.public_key != input.public_keys[slot] {
                return Err(ConsensusError::MalformedInput(format!(
                    "signature in slot {} belongs to {}",
                    slot, signature.public_key
                )));
            }
            input.signatures[slot] = Some(signature);
        }

        input.update_script()?;
        Ok(input)
    }
}
