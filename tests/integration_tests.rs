//! Integration tests for consensus-primitives

use consensus_primitives::*;

fn private_keys() -> Vec<PrivateKey> {
    [0x11u8, 0x22, 0x33]
        .iter()
        .map(|n| PrivateKey::from_slice(&[*n; 32]).unwrap())
        .collect()
}

fn public_keys() -> Vec<PublicKey> {
    private_keys().iter().map(PrivateKey::public_key).collect()
}

/// Funding output paying to a 2-of-3 multisig address, plus a tx spending it
fn multisig_fixture(registry: &NetworkRegistry) -> (Address, OutPoint, TransactionOutput, Transaction) {
    let address = Address::create_multisig(registry, &public_keys(), 2, None).unwrap();
    let funding = TransactionOutput {
        value: 250_000,
        script_pubkey: address.to_script().to_bytes(),
    };
    let prevout = OutPoint {
        hash: [0x5a; 32],
        index: 0,
    };
    let destination = Address::from_public_key_hash(registry, &[0x77; 20], None).unwrap();
    let spend = Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prevout: prevout.clone(),
            script_sig: vec![],
            sequence: SEQUENCE_FINAL,
        }],
        outputs: vec![TransactionOutput {
            value: 240_000,
            script_pubkey: destination.to_script().to_bytes(),
        }],
        lock_time: 0,
    };
    (address, prevout, funding, spend)
}

#[test]
fn test_multisig_spend_end_to_end() -> anyhow::Result<()> {
    let registry = NetworkRegistry::new();
    let (address, prevout, funding, mut spend) = multisig_fixture(&registry);

    let keys = private_keys();
    let mut input = MultiSigScriptHashInput::new(prevout, funding, &public_keys(), 2)?;
    for key in [&keys[2], &keys[0]] {
        for signature in input.get_signatures(&spend, key, 0, SIGHASH_ALL)? {
            input.add_signature(&spend, signature)?;
        }
    }
    assert!(input.is_fully_signed());

    spend.inputs[0] = input.to_transaction_input();
    transaction::check_output_values(&spend)?;

    // The unlocking script commits to the same P2SH hash the address encodes
    let script_sig = Script::from_bytes(&spend.inputs[0].script_sig)?;
    let derived = Address::from_script(&registry, &script_sig, None)?;
    assert_eq!(derived, address);

    // The serialized transaction round-trips with the signed input
    let raw = transaction::serialize_transaction(&spend);
    assert_eq!(transaction::deserialize_transaction(&raw)?, spend);
    Ok(())
}

#[test]
fn test_multisig_signature_order_independence() {
    let registry = NetworkRegistry::new();
    let (_, prevout, funding, spend) = multisig_fixture(&registry);
    let keys = private_keys();

    let sign_in_order = |order: [usize; 2]| {
        let mut input =
            MultiSigScriptHashInput::new(prevout.clone(), funding.clone(), &public_keys(), 2).unwrap();
        for i in order {
            let sig = input.get_signatures(&spend, &keys[i], 0, SIGHASH_ALL).unwrap().remove(0);
            input.add_signature(&spend, sig).unwrap();
        }
        input.script().clone()
    };

    assert_eq!(sign_in_order([0, 2]), sign_in_order([2, 0]));
}

#[test]
fn test_multisig_input_serde_round_trip() -> anyhow::Result<()> {
    let registry = NetworkRegistry::new();
    let (_, prevout, funding, spend) = multisig_fixture(&registry);

    let mut input = MultiSigScriptHashInput::new(prevout, funding, &public_keys(), 2)?;
    let sig = input
        .get_signatures(&spend, &private_keys()[1], 0, SIGHASH_ALL)?
        .remove(0);
    input.add_signature(&spend, sig)?;

    let json = serde_json::to_string(&input.to_object())?;
    let obj: multisig::MultiSigInputObject = serde_json::from_str(&json)?;
    let restored = MultiSigScriptHashInput::from_object(&obj)?;

    assert_eq!(restored.count_signatures(), 1);
    assert_eq!(restored.script(), input.script());
    assert_eq!(restored.public_keys_without_signature().len(), 2);
    Ok(())
}

#[test]
fn test_address_object_json() -> anyhow::Result<()> {
    let address: Address = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".parse()?;
    let json = serde_json::to_value(&address)?;
    assert_eq!(json["hash"], "62e907b15cbf27d5425399ebf6f0fb50ebb88f18");
    assert_eq!(json["type"], "pubkeyhash");
    assert_eq!(json["network"], "livenet");

    let back: Address = serde_json::from_value(json)?;
    assert_eq!(back, address);
    Ok(())
}

#[test]
fn test_merkle_proof_for_real_transactions() {
    // Four transactions, the third one matched
    let txs: Vec<Transaction> = (0..4u32)
        .map(|n| Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TransactionOutput {
                value: n as u64,
                script_pubkey: vec![],
            }],
            lock_time: n,
        })
        .collect();
    let ids: Vec<Hash> = txs.iter().map(transaction::transaction_id).collect();

    let node = |l: &Hash, r: &Hash| {
        let mut buf = l.to_vec();
        buf.extend_from_slice(r);
        hash::sha256d(&buf)
    };
    let left = node(&ids[0], &ids[1]);
    let right = node(&ids[2], &ids[3]);
    let root = node(&left, &right);

    let header = BlockHeader {
        version: 1,
        prev_block_hash: [0; 32],
        merkle_root: root,
        timestamp: 1_600_000_000,
        bits: 0x1d00ffff,
        nonce: 42,
    };
    // Bits, LSB first: root=1, left=0, right=1, tx2=1, tx3=0
    let block = MerkleBlock::new(header, 4, vec![left, ids[2], ids[3]], vec![0b0000_1101]);

    assert!(block.valid_merkle_tree());
    assert!(block.has_transaction(TxRef::Transaction(&txs[2])));
    assert!(!block.has_transaction(TxRef::Transaction(&txs[3])));
    assert_eq!(
        block.matched_transaction_ids(),
        vec![transaction::transaction_id_hex(&txs[2])]
    );

    // Lookup by the stored hash string, and by the displayed txid
    let obj = block.to_object();
    assert!(block.has_transaction(TxRef::Id(&obj.hashes[1])));
    assert!(!block.has_transaction(TxRef::Id(&obj.hashes[2])));
    assert!(block.has_transaction(TxRef::DisplayId(&transaction::transaction_id_hex(&txs[2]))));

    let decoded = MerkleBlock::from_bytes(&block.to_bytes()).unwrap();
    assert_eq!(decoded, block);
    assert!(decoded.valid_merkle_tree());
}
