//! Block processing
//!
//! Turns a raw block into the social actions it carries plus the UTXOs it
//! spends and creates.

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::Transaction;
use tracing::{debug, info};

use crate::address::script_to_address;
use crate::error::BlockError;
use crate::network::Network;
use crate::protocol::codec::decode_transaction;
use crate::protocol::lexer::{extract_mentions, extract_tags};
use crate::protocol::BorkType;
use crate::types::{BlockData, BorkTxData, NewUtxo, RawBlock, UtxoId};

/// Merges extensions published in their own transactions into the bork
/// they continue. Only borks seen earlier in the same block are candidates.
#[derive(Debug, Default)]
pub struct ExtensionChainer {
    entries: Vec<ChainEntry>,
}

#[derive(Debug)]
struct ChainEntry {
    bork: BorkTxData,
    /// Position the next extension must carry
    expected: u16,
    /// Txid of the last transaction merged into this chain
    tip: String,
}

impl ExtensionChainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next decoded bork in block order. `funding_txid` is the
    /// transaction spent by the bork's first input.
    pub fn push(&mut self, bork: BorkTxData, funding_txid: Option<&str>) {
        if bork.bork_type == BorkType::Extension {
            if let Some(target) = self.find_target(&bork, funding_txid) {
                let entry = &mut self.entries[target];
                debug!(
                    txid = %bork.txid,
                    root = %entry.bork.txid,
                    position = ?bork.position,
                    "Merging extension into bork"
                );
                append_content(&mut entry.bork, &bork);
                entry.expected = entry.bork.next_position();
                entry.tip = bork.txid;
                return;
            }
        }
        self.entries.push(ChainEntry {
            expected: bork.next_position(),
            tip: bork.txid.clone(),
            bork,
        });
    }

    /// A chain whose tip the extension spends wins over one that merely
    /// shares the nonce.
    fn find_target(&self, extension: &BorkTxData, funding_txid: Option<&str>) -> Option<usize> {
        let position = extension.position? as u16;
        let continues = |entry: &ChainEntry| {
            entry.expected == position
                && entry.bork.nonce == extension.nonce
                && entry.bork.sender_address == extension.sender_address
                && matches!(
                    entry.bork.bork_type,
                    BorkType::Bork | BorkType::Comment | BorkType::Rebork | BorkType::Extension
                )
        };

        funding_txid
            .and_then(|funding| {
                self.entries
                    .iter()
                    .rposition(|entry| entry.tip == funding && continues(entry))
            })
            .or_else(|| self.entries.iter().rposition(continues))
    }

    pub fn finish(self) -> Vec<BorkTxData> {
        self.entries.into_iter().map(|entry| entry.bork).collect()
    }
}

fn append_content(target: &mut BorkTxData, extension: &BorkTxData) {
    let mut content = target.content.take().unwrap_or_default();
    content.push_str(extension.content.as_deref().unwrap_or_default());
    target.mentions = extract_mentions(&content);
    target.tags = extract_tags(&content);
    target.content = Some(content);
    target.last_position = extension.last_position;
}

fn spent_outputs(tx: &Transaction) -> Vec<UtxoId> {
    if tx.is_coinbase() {
        return Vec::new();
    }
    tx.input
        .iter()
        .map(|input| UtxoId {
            txid: input.previous_output.txid.to_string(),
            index: input.previous_output.vout,
        })
        .collect()
}

fn created_outputs(
    tx: &Transaction,
    txid: &str,
    block_height: Option<u64>,
    network: Network,
) -> Vec<NewUtxo> {
    let raw = serialize_hex(tx);
    tx.output
        .iter()
        .enumerate()
        .filter(|(_, output)| !output.script_pubkey.is_op_return())
        .map(|(index, output)| NewUtxo {
            block_height,
            txid: txid.to_string(),
            index: index as u32,
            address: script_to_address(&output.script_pubkey, network),
            value: output.value.to_sat(),
            raw: raw.clone(),
        })
        .collect()
}

/// Decode a raw block given as hex
pub fn process_block(
    block_hex: &str,
    block_height: Option<u64>,
    network: Network,
) -> Result<BlockData, BlockError> {
    let block = RawBlock::from_hex(block_hex, network)?;
    process_raw_block(&block, block_height, network)
}

/// Decode an already parsed block
pub fn process_raw_block(
    block: &RawBlock,
    block_height: Option<u64>,
    network: Network,
) -> Result<BlockData, BlockError> {
    let timestamp = block.timestamp()?;
    let block_hash = block.block_hash().to_string();

    let mut chainer = ExtensionChainer::new();
    let mut txids = Vec::with_capacity(block.transactions.len());
    let mut spent = Vec::with_capacity(block.transactions.len());
    let mut created = Vec::with_capacity(block.transactions.len());

    for tx in &block.transactions {
        let txid = tx.compute_txid().to_string();

        if let Some(bork) = decode_transaction(tx, timestamp, network) {
            let funding_txid = tx
                .input
                .first()
                .map(|input| input.previous_output.txid.to_string());
            chainer.push(bork, funding_txid.as_deref());
        }

        spent.push(spent_outputs(tx));
        created.push(created_outputs(tx, &txid, block_height, network));
        txids.push(txid);
    }

    let borks = chainer.finish();
    info!(
        block_hash = %block_hash,
        height = ?block_height,
        transactions = txids.len(),
        borks = borks.len(),
        "Processed block"
    );

    Ok(BlockData {
        block_hash,
        height: block_height,
        timestamp,
        txids,
        borks,
        spent,
        created,
    })
}
