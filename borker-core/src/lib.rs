// Borker Core Library
// Bork protocol codec and block processing for Dogecoin, Litecoin and Bitcoin

// Public modules
pub mod address;
pub mod block_processor;
pub mod error;
pub mod network;
pub mod protocol;
pub mod script;
pub mod types;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use crate::block_processor::{process_block, process_raw_block, ExtensionChainer};
pub use crate::error::{BlockError, ProtocolError};
pub use crate::network::{Network, NetworkParams};
pub use crate::protocol::{BorkType, NewBork, NewBorkData};
pub use crate::types::{BlockData, BorkTxData, NewUtxo, RawBlock, UtxoId};
