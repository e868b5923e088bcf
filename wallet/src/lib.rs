//! Borker wallet
//!
//! BIP39 mnemonic handling, BIP32 key derivation and construction of signed
//! bork transactions.

pub mod child;
pub mod hdwallet;
pub mod transaction_builder;

pub use child::ChildWallet;
pub use hdwallet::{HDWalletError, Wallet};
pub use transaction_builder::{BorkTransactionBuilder, BuilderConfig, Output, TransactionError};
