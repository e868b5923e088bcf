//! End-to-end bork construction: build, then decode with the block processor

use bitcoin::absolute::LockTime;
use bitcoin::block::{Header, Version as BlockVersion};
use bitcoin::consensus::encode::{deserialize, serialize, VarInt};
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, BlockHash, CompactTarget, OutPoint, ScriptBuf, Sequence, Transaction, TxIn,
    TxMerkleNode, TxOut, Witness,
};
use borker_core::protocol::BorkType;
use borker_core::{process_block, Network, NewBorkData};
use wallet::{BorkTransactionBuilder, BuilderConfig, ChildWallet, Output, TransactionError, Wallet};

const FEE: u64 = 100_000;
const COIN: u64 = 100_000_000;

fn test_wallet() -> Wallet {
    let mut words = vec!["abandon".to_string(); 11];
    words.push("about".to_string());
    Wallet::new(Some(&words)).unwrap()
}

fn funding(child: &ChildWallet, values: &[u64]) -> String {
    let tx = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(bitcoin::Txid::from_byte_array([0x42; 32]), 0),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: values
            .iter()
            .map(|&value| TxOut {
                value: Amount::from_sat(value),
                script_pubkey: child.script_pubkey(),
            })
            .collect(),
    };
    hex::encode(serialize(&tx))
}

fn block_of(raw: &[Vec<u8>]) -> String {
    let header = Header {
        version: BlockVersion::ONE,
        prev_blockhash: BlockHash::all_zeros(),
        merkle_root: TxMerkleNode::all_zeros(),
        time: 1_700_000_000,
        bits: CompactTarget::from_consensus(0x1e0f_fff0),
        nonce: 0,
    };
    let mut bytes = serialize(&header);
    bytes.extend(serialize(&VarInt(raw.len() as u64)));
    for tx in raw {
        bytes.extend_from_slice(tx);
    }
    hex::encode(bytes)
}

fn bork(content: &str) -> NewBorkData {
    NewBorkData::new(BorkType::Bork).with_content(content)
}

#[test]
fn test_hello_bork_round_trip() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[10 * COIN])];

    let raw = child
        .new_bork(bork("hello"), &inputs, &[], &[], FEE, Network::Dogecoin)
        .unwrap();
    assert_eq!(raw.len(), 1);

    let tx: Transaction = deserialize(&raw[0]).unwrap();
    assert_eq!(tx.input.len(), 1);
    assert_eq!(tx.output.len(), 2);
    assert!(tx.output[0].script_pubkey.is_op_return());
    assert_eq!(tx.output[1].value.to_sat(), 10 * COIN - FEE);
    assert_eq!(tx.output[1].script_pubkey, child.script_pubkey());

    let block = process_block(&block_of(&raw), Some(1), Network::Dogecoin).unwrap();
    assert_eq!(block.borks.len(), 1);
    let decoded = &block.borks[0];
    assert_eq!(decoded.bork_type, BorkType::Bork);
    assert_eq!(decoded.content.as_deref(), Some("hello"));
    assert_eq!(decoded.reference_id, None);
    assert_eq!(decoded.sender_address, "DCuKLtD2iahf25s61QtxsLQT1DUpXj1WhQ");

    // The change output can fund the next bork
    assert_eq!(block.created[0].len(), 1);
    assert_eq!(block.created[0][0].raw, hex::encode(&raw[0]));
}

#[test]
fn test_long_bork_spans_chained_transactions() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[COIN, 2 * COIN])];
    let content = format!("{} #chain", "w".repeat(300));

    let raw = child
        .new_bork(bork(&content), &inputs, &[], &[], FEE, Network::Dogecoin)
        .unwrap();
    assert_eq!(raw.len(), 5);

    let txs: Vec<Transaction> = raw.iter().map(|r| deserialize(r).unwrap()).collect();
    // The larger coin alone covers five fees and the carries
    assert_eq!(txs[0].input.len(), 1);
    for pair in txs.windows(2) {
        assert_eq!(pair[1].input.len(), 1);
        assert_eq!(pair[1].input[0].previous_output.txid, pair[0].compute_txid());
        assert_eq!(
            pair[1].input[0].previous_output.vout as usize,
            pair[0].output.len() - 1
        );
    }
    let last = txs.last().unwrap();
    assert_eq!(last.output.last().unwrap().value.to_sat(), 2 * COIN - 5 * FEE);

    let block = process_block(&block_of(&raw), None, Network::Dogecoin).unwrap();
    assert_eq!(block.borks.len(), 1);
    assert_eq!(block.borks[0].content.as_deref(), Some(content.as_str()));
    assert_eq!(block.borks[0].tags, vec!["chain".to_string()]);
    assert_eq!(block.borks[0].txid, txs[0].compute_txid().to_string());
}

#[test]
fn test_many_data_outputs_in_one_transaction() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[COIN])];
    let content = "q".repeat(200);
    let config = BuilderConfig {
        max_data_outputs_per_tx: 4,
        ..BuilderConfig::default()
    };

    let raw = BorkTransactionBuilder::new(&child, Network::Dogecoin, config)
        .build(bork(&content), &inputs, &[], &[], FEE)
        .unwrap();
    assert_eq!(raw.len(), 1);

    let block = process_block(&block_of(&raw), None, Network::Dogecoin).unwrap();
    assert_eq!(block.borks[0].content.as_deref(), Some(content.as_str()));
}

#[test]
fn test_recipients_and_mentions() {
    let wallet = test_wallet();
    let child = wallet.child_at(&[0]).unwrap();
    let friend = wallet.child_at(&[1]).unwrap().address(Network::Dogecoin);
    let tipped = wallet.child_at(&[2]).unwrap().address(Network::Dogecoin);
    let inputs = vec![funding(&child, &[10 * COIN])];

    let content = format!("hi @{}", friend);
    let raw = child
        .new_bork(
            bork(&content),
            &inputs,
            &[Output::new(tipped.clone(), COIN)],
            &[friend.clone()],
            FEE,
            Network::Dogecoin,
        )
        .unwrap();

    let tx: Transaction = deserialize(&raw[0]).unwrap();
    let dust = Network::Dogecoin.dust_limit();
    assert_eq!(tx.output[1].value.to_sat(), COIN);
    assert_eq!(tx.output[2].value.to_sat(), dust);
    assert_eq!(tx.output[3].value.to_sat(), 10 * COIN - COIN - dust - FEE);

    let block = process_block(&block_of(&raw), None, Network::Dogecoin).unwrap();
    let decoded = &block.borks[0];
    assert_eq!(decoded.mentions, vec![friend]);
    assert_eq!(decoded.recipient_address.as_deref(), Some(tipped.as_str()));
}

#[test]
fn test_comment_references_parent() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[COIN])];
    let parent = "7a".repeat(32);

    let raw = child
        .new_bork(
            NewBorkData::new(BorkType::Comment)
                .with_content("agreed")
                .with_reference(parent.clone()),
            &inputs,
            &[],
            &[],
            FEE,
            Network::Dogecoin,
        )
        .unwrap();

    let block = process_block(&block_of(&raw), None, Network::Dogecoin).unwrap();
    assert_eq!(block.borks[0].bork_type, BorkType::Comment);
    assert_eq!(block.borks[0].reference_id.as_deref(), Some(parent.as_str()));
}

#[test]
fn test_insufficient_funds() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[FEE / 2])];
    let err = child
        .new_bork(bork("hello"), &inputs, &[], &[], FEE, Network::Dogecoin)
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionError::InsufficientFunds { needed: FEE, available } if available == FEE / 2
    ));
}

#[test]
fn test_carry_below_dust_is_insufficient() {
    let child = test_wallet().child_at(&[0]).unwrap();
    // Covers two fees but would leave less than dust between the transactions
    let inputs = vec![funding(&child, &[2 * FEE + 10])];
    let err = child
        .new_bork(bork(&"x".repeat(120)), &inputs, &[], &[], FEE, Network::Dogecoin)
        .unwrap_err();
    assert!(matches!(err, TransactionError::InsufficientFunds { .. }));
}

#[test]
fn test_foreign_inputs_are_not_spendable() {
    let wallet = test_wallet();
    let child = wallet.child_at(&[0]).unwrap();
    let stranger = wallet.child_at(&[9]).unwrap();
    let inputs = vec![funding(&stranger, &[10 * COIN])];
    let err = child
        .new_bork(bork("hello"), &inputs, &[], &[], FEE, Network::Dogecoin)
        .unwrap_err();
    assert!(matches!(err, TransactionError::InsufficientFunds { available: 0, .. }));
}

#[test]
fn test_small_change_is_left_to_fee() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[FEE + 10])];
    let raw = child
        .new_bork(bork("hello"), &inputs, &[], &[], FEE, Network::Dogecoin)
        .unwrap();
    let tx: Transaction = deserialize(&raw[0]).unwrap();
    assert_eq!(tx.output.len(), 1);
}

#[test]
fn test_building_is_deterministic() {
    let child = test_wallet().child_at(&[0]).unwrap();
    let inputs = vec![funding(&child, &[COIN, COIN, 3 * COIN])];
    let content = "d".repeat(100);
    let first = child
        .new_bork(bork(&content), &inputs, &[], &[], FEE, Network::Litecoin)
        .unwrap();
    let second = child
        .new_bork(bork(&content), &inputs, &[], &[], FEE, Network::Litecoin)
        .unwrap();
    assert_eq!(first, second);
}
