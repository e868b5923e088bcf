//! Records produced by the decoder

pub mod block;
pub mod bork;

pub use block::{BlockData, NewUtxo, RawBlock, UtxoId};
pub use bork::BorkTxData;
