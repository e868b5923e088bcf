use anyhow::{Context, Result};
use borker_core::{BorkType, Network, NewBorkData};
use std::path::PathBuf;
use tracing::info;
use wallet::{BorkTransactionBuilder, BuilderConfig, Output};

use super::{read_hex_arg, read_wallet};

/// Everything needed to publish one bork
#[derive(Debug, Clone)]
pub struct BorkRequest {
    pub wallet: PathBuf,
    pub path: Vec<u32>,
    pub network: Network,
    pub bork_type: BorkType,
    pub content: Option<String>,
    pub reference_id: Option<String>,
    /// Funding transactions, hex or `@file`
    pub inputs: Vec<String>,
    pub outputs: Vec<Output>,
    pub mentions: Vec<String>,
    pub fee: u64,
}

/// Build and sign the transactions, returned as hex in broadcast order
pub fn bork(request: &BorkRequest, config: &BuilderConfig) -> Result<Vec<String>> {
    let wallet = read_wallet(&request.wallet)?;
    let child = wallet.child_at(&request.path).context("Failed to derive key")?;

    let inputs = request
        .inputs
        .iter()
        .map(|input| read_hex_arg(input))
        .collect::<Result<Vec<_>>>()?;

    let mut data = NewBorkData::new(request.bork_type);
    data.content = request.content.clone();
    data.reference_id = request.reference_id.clone();

    let txs = BorkTransactionBuilder::new(&child, request.network, config.clone())
        .build(data, &inputs, &request.outputs, &request.mentions, request.fee)
        .context("Failed to build bork")?;

    info!(
        sender = %child.address(request.network),
        transactions = txs.len(),
        "Bork built"
    );
    Ok(txs.iter().map(hex::encode).collect())
}
