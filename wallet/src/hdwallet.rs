use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::NetworkKind;
use bincode::Options;
use borker_core::Network;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroize;

use crate::child::ChildWallet;

/// Current wallet buffer format
pub const BUFFER_VERSION: u32 = 1;

/// Upper bound on a serialized wallet buffer
const MAX_BUFFER_LEN: u64 = 1024;

#[derive(Error, Debug)]
pub enum HDWalletError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Invalid wallet buffer: {0}")]
    InvalidBuffer(String),
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),
}

/// On-disk form of a wallet. The master key is recomputed from the entropy.
#[derive(Serialize, Deserialize)]
struct WalletBuffer {
    version: u32,
    entropy: Vec<u8>,
}

impl Drop for WalletBuffer {
    fn drop(&mut self) {
        self.entropy.zeroize();
    }
}

fn buffer_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_BUFFER_LEN)
        .reject_trailing_bytes()
}

/// BIP39/BIP32 hierarchical deterministic wallet
#[derive(Clone)]
pub struct Wallet {
    mnemonic: Mnemonic,
    master: Xpriv,
}

impl Wallet {
    /// Restore from a mnemonic, or generate a fresh 12-word one when `words`
    /// is `None`
    pub fn new(words: Option<&[String]>) -> Result<Self, HDWalletError> {
        let mnemonic = match words {
            Some(words) => Mnemonic::parse_in_normalized(Language::English, &words.join(" "))
                .map_err(|e| HDWalletError::InvalidMnemonic(e.to_string()))?,
            None => {
                // Generate entropy for a 12-word mnemonic (128 bits = 16 bytes)
                let mut entropy = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut entropy);
                let mnemonic = Mnemonic::from_entropy(&entropy)
                    .map_err(|e| HDWalletError::InvalidMnemonic(e.to_string()));
                entropy.zeroize();
                mnemonic?
            }
        };
        Self::from_mnemonic(mnemonic)
    }

    fn from_mnemonic(mnemonic: Mnemonic) -> Result<Self, HDWalletError> {
        let mut seed = mnemonic.to_seed("");
        let master = Xpriv::new_master(NetworkKind::Main, &seed)
            .map_err(|e| HDWalletError::KeyDerivation(e.to_string()));
        seed.zeroize();
        Ok(Self {
            mnemonic,
            master: master?,
        })
    }

    pub fn words(&self) -> Vec<String> {
        self.mnemonic.to_string().split_whitespace().map(str::to_string).collect()
    }

    /// Derive the key at `path`. Indices at or above 2^31 are hardened.
    pub fn child_at(&self, path: &[u32]) -> Result<ChildWallet, HDWalletError> {
        let secp = Secp256k1::new();
        let numbers: Vec<ChildNumber> =
            path.iter().map(|&index| ChildNumber::from(index)).collect();
        let derived = self
            .master
            .derive_priv(&secp, &numbers)
            .map_err(|e| HDWalletError::KeyDerivation(e.to_string()))?;
        Ok(ChildWallet::new(path.to_vec(), derived.private_key))
    }

    /// Key at the BIP44 receive path `m/44'/coin'/account'/0/index`
    pub fn bip44_child(
        &self,
        network: Network,
        account: u32,
        index: u32,
    ) -> Result<ChildWallet, HDWalletError> {
        self.child_at(&network.bip44_path(account, 0, index))
    }

    pub fn to_buffer(&self) -> Result<Vec<u8>, HDWalletError> {
        let buffer = WalletBuffer {
            version: BUFFER_VERSION,
            entropy: self.mnemonic.to_entropy(),
        };
        buffer_options()
            .serialize(&buffer)
            .map_err(|e| HDWalletError::InvalidBuffer(e.to_string()))
    }

    pub fn from_buffer(bytes: &[u8]) -> Result<Self, HDWalletError> {
        let buffer: WalletBuffer = buffer_options()
            .deserialize(bytes)
            .map_err(|e| HDWalletError::InvalidBuffer(e.to_string()))?;
        if buffer.version != BUFFER_VERSION {
            return Err(HDWalletError::InvalidBuffer(format!(
                "unsupported version {}",
                buffer.version
            )));
        }
        let mnemonic = Mnemonic::from_entropy(&buffer.entropy)
            .map_err(|e| HDWalletError::InvalidBuffer(e.to_string()))?;
        Self::from_mnemonic(mnemonic)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("fingerprint", &self.master.fingerprint(&Secp256k1::new()))
            .finish_non_exhaustive()
    }
}
