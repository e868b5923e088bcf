use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use wallet::Wallet;

use super::write_wallet;

#[derive(Debug, Serialize)]
pub struct SeedOutput {
    pub words: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<PathBuf>,
}

/// Generate a fresh mnemonic, optionally saving the wallet buffer
pub fn new_seed(out: Option<&Path>) -> Result<SeedOutput> {
    let wallet = Wallet::new(None).context("Failed to generate wallet")?;
    finish(wallet, out)
}

/// Validate a mnemonic, optionally saving the wallet buffer
pub fn restore_seed(words: &[String], out: Option<&Path>) -> Result<SeedOutput> {
    // accept the phrase as one quoted argument as well as word by word
    let words: Vec<String> = words
        .iter()
        .flat_map(|w| w.split_whitespace())
        .map(str::to_string)
        .collect();
    let wallet = Wallet::new(Some(&words)).context("Failed to restore wallet")?;
    finish(wallet, out)
}

fn finish(wallet: Wallet, out: Option<&Path>) -> Result<SeedOutput> {
    if let Some(path) = out {
        write_wallet(&wallet, path)?;
        info!(path = %path.display(), "Wallet saved");
    }
    Ok(SeedOutput {
        words: wallet.words(),
        wallet: out.map(Path::to_path_buf),
    })
}
