use anyhow::{Context, Result};
use borker_core::Network;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wallet::BuilderConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chain to derive addresses and build transactions for
    pub network: Network,

    /// Fee per transaction, in base units
    pub fee: u64,

    /// Derivation path used when `--path` is not given
    pub derivation_path: String,

    /// Default wallet file
    pub wallet_path: Option<PathBuf>,

    /// Transaction builder settings
    pub builder: BuilderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Dogecoin,
            fee: 100_000_000,
            derivation_path: "0".to_string(),
            wallet_path: None,
            builder: BuilderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when the file does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = home_dir().context("Failed to get home directory")?;
        Ok(home.join(".borker").join("config.toml"))
    }
}
