//! Tests for the public ConsensusPrimitives API

use consensus_primitives::*;

#[test]
fn test_consensus_primitives_new_uses_global_registry() {
    let primitives = ConsensusPrimitives::new();
    assert!(std::ptr::eq(primitives.registry(), NetworkRegistry::global()));
}

#[test]
fn test_consensus_primitives_default() {
    let primitives = ConsensusPrimitives::default();
    assert!(primitives.registry().get("livenet").is_some());
}

#[test]
fn test_address_from_string() {
    let primitives = ConsensusPrimitives::new();
    let address = primitives
        .address_from_string("3QJmV3qfvL9SuYo34YihAf3sRCW3qSinyC", None, None)
        .unwrap();
    assert!(address.is_pay_to_script_hash());
    assert_eq!(address.network().name, "livenet");
}

#[test]
fn test_address_with_private_registry() {
    let registry = NetworkRegistry::new();
    registry.set_default("testnet").unwrap();
    let primitives = ConsensusPrimitives::with_registry(&registry);

    let key = PrivateKey::from_slice(&[3u8; 32]).unwrap().public_key();
    let address = primitives.address_from_public_key(&key, None).unwrap();
    assert_eq!(address.network().name, "testnet");
    assert_eq!(address.to_bytes()[0], 0x30);
}

#[test]
fn test_address_generic_input() {
    let primitives = ConsensusPrimitives::new();
    let hash = [0x11u8; 20];
    let address = primitives
        .address(AddressInput::Bytes(&hash), Some("livenet"), Some(AddressType::ScriptHash))
        .unwrap();
    assert_eq!(address.to_bytes()[0], 0x05);
}

#[test]
fn test_address_validation() {
    let primitives = ConsensusPrimitives::new();
    let good = AddressInput::Str("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa");
    assert!(primitives.is_valid_address(good, None, None));
    assert!(primitives.address_validation_error(good, None, None).is_none());

    let bad = AddressInput::Str("1A1zP1eP5QGefi2DMPTfTL5SLmv7Div");
    let err = primitives.address_validation_error(bad, None, None).unwrap();
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[test]
fn test_address_from_script() {
    let primitives = ConsensusPrimitives::new();
    let script = Script::build_public_key_hash_out(&[0x22; 20]);
    let address = primitives.address_from_script(&script, None).unwrap();
    assert_eq!(address.hash(), &[0x22; 20]);
}

#[test]
fn test_multisig_input_via_facade() {
    let primitives = ConsensusPrimitives::new();
    let keys: Vec<PublicKey> = (1..=2u8)
        .map(|n| PrivateKey::from_slice(&[n; 32]).unwrap().public_key())
        .collect();
    let redeem = Script::build_multisig_out(&keys, 2).unwrap();
    let output = TransactionOutput {
        value: 10_000,
        script_pubkey: Script::build_script_hash_out(&redeem).to_bytes(),
    };
    let input = primitives
        .multisig_input(OutPoint { hash: [1; 32], index: 0 }, output, &keys, 2)
        .unwrap();
    assert_eq!(input.signing_state(), SigningState::Unsigned);
}

#[test]
fn test_merkle_block_via_facade() {
    let primitives = ConsensusPrimitives::new();
    let tx = Transaction {
        version: 2,
        inputs: vec![],
        outputs: vec![],
        lock_time: 0,
    };
    let id = transaction::transaction_id(&tx);
    let header = BlockHeader {
        version: 1,
        prev_block_hash: [0; 32],
        merkle_root: id,
        timestamp: 0,
        bits: 0,
        nonce: 0,
    };
    let block = MerkleBlock::new(header, 1, vec![id], vec![1]);

    let parsed = primitives.parse_merkle_block(&block.to_bytes()).unwrap();
    assert!(primitives.verify_merkle_block(&parsed));
    assert!(primitives.merkle_block_proves(&parsed, TxRef::Transaction(&tx)));
    assert!(primitives.merkle_block_proves(&parsed, TxRef::DisplayId(&primitives.transaction_id(&tx))));
}
