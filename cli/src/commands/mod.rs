pub mod address;
pub mod block;
pub mod bork;
pub mod seed;

use anyhow::{anyhow, bail, Context, Result};
use borker_core::network::HARDENED;
use serde::Serialize;
use std::fs;
use std::path::Path;
use wallet::{Output, Wallet};

/// Print a value as pretty JSON on stdout
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Parse a derivation path such as `m/44'/3'/0'/0/0` or `0/1`. A trailing
/// `'` or `h` marks a hardened index.
pub fn parse_path(path: &str) -> Result<Vec<u32>> {
    let trimmed = path.trim();
    let body = trimmed
        .strip_prefix("m/")
        .unwrap_or(if trimmed == "m" { "" } else { trimmed });
    if body.is_empty() {
        return Ok(Vec::new());
    }

    body.split('/')
        .map(|segment| {
            let (digits, hardened) = match segment.strip_suffix(['\'', 'h']) {
                Some(digits) => (digits, true),
                None => (segment, false),
            };
            let index: u32 = digits
                .parse()
                .with_context(|| format!("Invalid path segment '{}'", segment))?;
            if index >= HARDENED {
                bail!("Path index {} out of range", index);
            }
            Ok(if hardened { index | HARDENED } else { index })
        })
        .collect()
}

/// Parse an `address:value` payment
pub fn parse_output(arg: &str) -> Result<Output> {
    let (address, value) = arg
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Expected address:value, got '{}'", arg))?;
    let value: u64 = value
        .parse()
        .with_context(|| format!("Invalid output value '{}'", value))?;
    Ok(Output::new(address, value))
}

/// Hex given inline, or read from a file when prefixed with `@`
pub fn read_hex_arg(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(file) => {
            let contents = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file))?;
            Ok(contents.trim().to_string())
        }
        None => Ok(arg.trim().to_string()),
    }
}

pub fn read_wallet(path: &Path) -> Result<Wallet> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read wallet file {}", path.display()))?;
    Wallet::from_buffer(&bytes).context("Failed to load wallet")
}

pub fn write_wallet(wallet: &Wallet, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).context("Failed to create wallet directory")?;
    }
    let buffer = wallet.to_buffer().context("Failed to serialize wallet")?;
    fs::write(path, buffer)
        .with_context(|| format!("Failed to write wallet file {}", path.display()))?;
    Ok(())
}
