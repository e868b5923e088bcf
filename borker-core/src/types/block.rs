//! Raw block parsing and the per-block output record

use bitcoin::block::Header;
use bitcoin::consensus::encode::{deserialize_partial, Decodable, VarInt};
use bitcoin::{BlockHash, Transaction};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::bork::BorkTxData;
use crate::error::BlockError;
use crate::network::Network;

/// Header version bit signalling a merged-mining proof
pub const AUXPOW_VERSION_FLAG: i32 = 0x100;

/// Reference to a transaction output
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoId {
    pub txid: String,
    pub index: u32,
}

/// An output created in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUtxo {
    pub block_height: Option<u64>,
    pub txid: String,
    pub index: u32,
    /// `None` for non-standard scripts
    pub address: Option<String>,
    pub value: u64,
    /// Hex of the whole creating transaction
    pub raw: String,
}

/// Everything extracted from one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    pub block_hash: String,
    pub height: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub txids: Vec<String>,
    pub borks: Vec<BorkTxData>,
    /// Outputs spent by each transaction, aligned with `txids`
    pub spent: Vec<Vec<UtxoId>>,
    /// Outputs created by each transaction, aligned with `txids`
    pub created: Vec<Vec<NewUtxo>>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read<T: Decodable>(&mut self) -> Result<T, BlockError> {
        let (value, consumed) = deserialize_partial(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    fn skip_merkle_branch(&mut self) -> Result<(), BlockError> {
        let VarInt(len) = self.read()?;
        for _ in 0..len {
            self.read::<[u8; 32]>()?;
        }
        self.read::<i32>()?;
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// A block split into its header and transactions
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl RawBlock {
    pub fn from_hex(block_hex: &str, network: Network) -> Result<RawBlock, BlockError> {
        let bytes = hex::decode(block_hex.trim())?;
        RawBlock::parse(&bytes, network)
    }

    /// Parse a consensus-serialized block. On chains with merged mining the
    /// AuxPoW section following a flagged header is skipped.
    pub fn parse(bytes: &[u8], network: Network) -> Result<RawBlock, BlockError> {
        let mut reader = Reader::new(bytes);
        let header: Header = reader.read()?;

        if network.params().auxpow && header.version.to_consensus() & AUXPOW_VERSION_FLAG != 0 {
            reader.read::<Transaction>()?;
            reader.read::<BlockHash>()?;
            reader.skip_merkle_branch()?;
            reader.skip_merkle_branch()?;
            reader.read::<Header>()?;
        }

        let VarInt(count) = reader.read()?;
        // Smallest possible transaction is 60 bytes
        let mut transactions = Vec::with_capacity((count as usize).min(reader.remaining() / 60));
        for _ in 0..count {
            transactions.push(reader.read::<Transaction>()?);
        }

        if reader.remaining() != 0 {
            return Err(BlockError::TrailingBytes(reader.remaining()));
        }

        Ok(RawBlock { header, transactions })
    }

    pub fn block_hash(&self) -> BlockHash {
        self.header.block_hash()
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, BlockError> {
        Utc.timestamp_opt(self.header.time as i64, 0)
            .single()
            .ok_or_else(|| BlockError::Decode(format!("invalid block time {}", self.header.time)))
    }
}
