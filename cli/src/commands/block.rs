use anyhow::{Context, Result};
use borker_core::{BlockData, Network};

use super::read_hex_arg;

/// Decode a block given as hex, or as `@file` holding the hex
pub fn process_block(block: &str, height: Option<u64>, network: Network) -> Result<BlockData> {
    let block_hex = read_hex_arg(block)?;
    borker_core::process_block(&block_hex, height, network).context("Failed to process block")
}
