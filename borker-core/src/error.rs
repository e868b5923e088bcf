//! Error types for the Borker engine
//!
//! Construction-side problems are hard errors. Foreign or malformed payloads
//! found while scanning chain data are not represented here at all: the
//! decoder simply skips them.

use thiserror::Error;

/// Errors raised while validating or encoding a new bork
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid bork data: {0}")]
    InvalidBorkData(String),

    #[error("Content too long: {len} bytes exceeds maximum {max}")]
    ContentTooLong { len: usize, max: usize },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors raised while parsing a raw block
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Block is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Failed to decode block: {0}")]
    Decode(String),

    #[error("Block has {0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

impl From<bitcoin::consensus::encode::Error> for BlockError {
    fn from(e: bitcoin::consensus::encode::Error) -> Self {
        BlockError::Decode(e.to_string())
    }
}
