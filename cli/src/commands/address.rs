use anyhow::{Context, Result};
use borker_core::Network;
use serde::Serialize;
use std::path::Path;

use super::read_wallet;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressOutput {
    pub network: Network,
    pub path: Vec<u32>,
    pub address: String,
    pub public_key: String,
}

pub fn address(wallet_file: &Path, path: &[u32], network: Network) -> Result<AddressOutput> {
    let wallet = read_wallet(wallet_file)?;
    let child = wallet.child_at(path).context("Failed to derive key")?;
    Ok(AddressOutput {
        network,
        path: path.to_vec(),
        address: child.address(network),
        public_key: hex::encode(child.public_key()),
    })
}
