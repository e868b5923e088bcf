//! Per-chain parameters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BIP32 hardened index flag
pub const HARDENED: u32 = 0x8000_0000;

/// Chains the protocol runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Dogecoin,
    Litecoin,
    Bitcoin,
}

/// Constants that differ between chains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    /// Version byte of base58check P2PKH addresses
    pub p2pkh_version: u8,
    /// Version byte of base58check P2SH addresses
    pub p2sh_version: u8,
    /// Version byte of WIF private keys
    pub wif_version: u8,
    /// SLIP-44 coin type used in BIP44 paths
    pub bip44_coin_type: u32,
    /// Human readable part of segwit addresses, if the chain has segwit
    pub bech32_hrp: Option<&'static str>,
    /// Whether block headers may carry merged-mining proofs
    pub auxpow: bool,
    /// Smallest output value relayed by default policy
    pub dust_limit: u64,
}

const DOGECOIN: NetworkParams = NetworkParams {
    name: "dogecoin",
    p2pkh_version: 0x1E,
    p2sh_version: 0x16,
    wif_version: 0x9E,
    bip44_coin_type: 3,
    bech32_hrp: None,
    auxpow: true,
    dust_limit: 1_000_000,
};

const LITECOIN: NetworkParams = NetworkParams {
    name: "litecoin",
    p2pkh_version: 0x30,
    p2sh_version: 0x32,
    wif_version: 0xB0,
    bip44_coin_type: 2,
    bech32_hrp: Some("ltc"),
    auxpow: false,
    dust_limit: 5_460,
};

const BITCOIN: NetworkParams = NetworkParams {
    name: "bitcoin",
    p2pkh_version: 0x00,
    p2sh_version: 0x05,
    wif_version: 0x80,
    bip44_coin_type: 0,
    bech32_hrp: Some("bc"),
    auxpow: false,
    dust_limit: 546,
};

impl Network {
    pub const ALL: [Network; 3] = [Network::Dogecoin, Network::Litecoin, Network::Bitcoin];

    pub fn params(&self) -> &'static NetworkParams {
        match self {
            Network::Dogecoin => &DOGECOIN,
            Network::Litecoin => &LITECOIN,
            Network::Bitcoin => &BITCOIN,
        }
    }

    /// BIP44 path `m/44'/coin'/account'/change/index`
    pub fn bip44_path(&self, account: u32, change: u32, index: u32) -> Vec<u32> {
        vec![
            44 | HARDENED,
            self.params().bip44_coin_type | HARDENED,
            account | HARDENED,
            change,
            index,
        ]
    }

    pub fn dust_limit(&self) -> u64 {
        self.params().dust_limit
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dogecoin" | "doge" => Ok(Network::Dogecoin),
            "litecoin" | "ltc" => Ok(Network::Litecoin),
            "bitcoin" | "btc" => Ok(Network::Bitcoin),
            _ => Err(format!("Invalid network: {}", s)),
        }
    }
}
