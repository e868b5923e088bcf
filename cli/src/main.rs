use anyhow::{anyhow, Context, Result};
use borker_cli::commands::{self, bork::BorkRequest};
use borker_cli::config::Config;
use borker_cli::logging::init_logging;
use borker_core::{BorkType, Network};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "borker-cli")]
#[command(author, version, about = "Borker protocol command-line interface", long_about = None)]
struct Cli {
    /// Network (dogecoin, litecoin, bitcoin)
    #[arg(short, long, global = true, env = "BORKER_NETWORK")]
    network: Option<Network>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new mnemonic
    NewSeed {
        /// Write the wallet file here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Restore a wallet from its mnemonic
    RestoreSeed {
        /// Mnemonic words
        #[arg(required = true)]
        words: Vec<String>,
        /// Write the wallet file here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show the address at a derivation path
    Address {
        /// Wallet file
        #[arg(short, long)]
        wallet: Option<PathBuf>,
        /// Derivation path, e.g. 0 or m/44'/3'/0'/0/0
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Decode a raw block and print its protocol data
    ProcessBlock {
        /// Block hex, or @file
        block: String,
        /// Height recorded for created outputs
        #[arg(long)]
        height: Option<u64>,
    },
    /// Build and sign the transactions for a bork
    Bork {
        /// Wallet file
        #[arg(short, long)]
        wallet: Option<PathBuf>,
        /// Derivation path of the signing key
        #[arg(short, long)]
        path: Option<String>,
        /// Action type, e.g. bork, comment, set_name
        #[arg(short = 't', long = "type")]
        bork_type: BorkType,
        /// Text content
        #[arg(long)]
        content: Option<String>,
        /// Referenced txid prefix or address
        #[arg(long)]
        reference: Option<String>,
        /// Funding transaction hex, or @file
        #[arg(short, long = "input", required = true)]
        inputs: Vec<String>,
        /// Payment as address:value
        #[arg(short, long = "output")]
        outputs: Vec<String>,
        /// Address to notify
        #[arg(short, long = "mention")]
        mentions: Vec<String>,
        /// Fee per transaction
        #[arg(short, long)]
        fee: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    init_logging(Some(level)).map_err(|e| anyhow!(e))?;

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::NewSeed { out } => {
            commands::print_json(&commands::seed::new_seed(out.as_deref())?)?;
        }
        Commands::RestoreSeed { words, out } => {
            commands::print_json(&commands::seed::restore_seed(&words, out.as_deref())?)?;
        }
        Commands::Address { wallet, path } => {
            let wallet = wallet_file(wallet, &config)?;
            let path = commands::parse_path(path.as_deref().unwrap_or(&config.derivation_path))?;
            commands::print_json(&commands::address::address(&wallet, &path, config.network)?)?;
        }
        Commands::ProcessBlock { block, height } => {
            let data = commands::block::process_block(&block, height, config.network)?;
            commands::print_json(&data)?;
        }
        Commands::Bork {
            wallet,
            path,
            bork_type,
            content,
            reference,
            inputs,
            outputs,
            mentions,
            fee,
        } => {
            let request = BorkRequest {
                wallet: wallet_file(wallet, &config)?,
                path: commands::parse_path(path.as_deref().unwrap_or(&config.derivation_path))?,
                network: config.network,
                bork_type,
                content,
                reference_id: reference,
                inputs,
                outputs: outputs
                    .iter()
                    .map(|o| commands::parse_output(o))
                    .collect::<Result<_>>()?,
                mentions,
                fee: fee.unwrap_or(config.fee),
            };
            for tx in commands::bork::bork(&request, &config.builder)? {
                println!("{}", tx);
            }
        }
    }

    Ok(())
}

fn wallet_file(arg: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    arg.or_else(|| config.wallet_path.clone())
        .context("No wallet file given and none configured")
}
