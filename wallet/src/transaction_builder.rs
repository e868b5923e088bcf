// Transaction builder for bork publishing
// Coin selection, payload placement, transaction chaining and signing

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use borker_core::address::address_to_script;
use borker_core::error::ProtocolError;
use borker_core::protocol::codec::encode;
use borker_core::protocol::extract_mentions;
use borker_core::script::op_return_script;
use borker_core::{Network, NewBork, NewBorkData};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::convert::TryFrom;
use thiserror::Error;
use tracing::{debug, info};

use crate::child::ChildWallet;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid bork data: {0}")]
    InvalidBorkData(#[from] ProtocolError),

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Invalid input transaction: {0}")]
    InvalidInput(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Too many inputs: {count} exceeds maximum {max}")]
    TooManyInputs { count: usize, max: usize },

    #[error("Signing error: {0}")]
    Signing(String),
}

/// Transaction builder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Data outputs placed in each transaction
    pub max_data_outputs_per_tx: usize,

    /// Value sent to each mentioned address, the network dust limit if unset
    pub mention_value: Option<u64>,

    /// Largest number of coins a bork may spend
    pub max_inputs: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_data_outputs_per_tx: 1, // standardness allows one OP_RETURN
            mention_value: None,
            max_inputs: 500,
        }
    }
}

/// Payment requested alongside a bork
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub address: String,
    pub value: u64,
}

impl Output {
    pub fn new(address: impl Into<String>, value: u64) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }
}

/// Coin paying the builder's own key
#[derive(Debug, Clone, PartialEq, Eq)]
struct Utxo {
    outpoint: OutPoint,
    value: u64,
}

/// Transaction builder
pub struct BorkTransactionBuilder<'a> {
    wallet: &'a ChildWallet,
    network: Network,
    config: BuilderConfig,
}

impl<'a> BorkTransactionBuilder<'a> {
    pub fn new(wallet: &'a ChildWallet, network: Network, config: BuilderConfig) -> Self {
        Self {
            wallet,
            network,
            config,
        }
    }

    /// Build and sign the transactions publishing `data`.
    ///
    /// `inputs` are hex raw transactions; their outputs paying this wallet
    /// are the coins available for spending. Content needing more data
    /// outputs than one transaction may carry is spread over a chain of
    /// transactions, each spending the change of the one before. Nothing is
    /// signed until every check has passed.
    ///
    /// Every address in `mentions` must also appear as an `@` mention in
    /// the content. Decoders tell mention outputs apart from the recipient
    /// by reading the content, so an unannounced mention output would be
    /// reported as the recipient.
    pub fn build(
        &self,
        data: NewBorkData,
        inputs: &[String],
        outputs: &[Output],
        mentions: &[String],
        fee: u64,
    ) -> Result<Vec<Vec<u8>>, TransactionError> {
        let announced = data.content.as_deref().map(extract_mentions).unwrap_or_default();
        let bork = NewBork::try_from(data)?;
        if let Some(missing) = mentions.iter().find(|m| !announced.contains(*m)) {
            return Err(TransactionError::InvalidAddress(format!(
                "{} is not mentioned in the content",
                missing
            )));
        }

        let utxos = self.collect_utxos(inputs)?;
        let mut payments = self.payment_outputs(outputs, mentions)?;
        let payment_total = payments
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value.to_sat()))
            .ok_or_else(|| TransactionError::InvalidAmount("Amount overflow".to_string()))?;

        let per_tx = self.config.max_data_outputs_per_tx.max(1);
        let tx_count = encode(&bork, 0)?.len().div_ceil(per_tx);
        let dust = self.network.dust_limit();

        let fees = fee
            .checked_mul(tx_count as u64)
            .ok_or_else(|| TransactionError::InvalidAmount("Fee overflow".to_string()))?;
        let needed = payment_total
            .checked_add(fees)
            .ok_or_else(|| TransactionError::InvalidAmount("Amount overflow".to_string()))?;
        // Every intermediate transaction must leave a spendable carry
        let target = if tx_count > 1 {
            needed.max((needed - fee).saturating_add(dust))
        } else {
            needed
        };

        let selected = self.select_coins(&utxos, target)?;
        let input_total: u64 = selected.iter().map(|utxo| utxo.value).sum();

        let nonce = nonce_for(&selected[0].outpoint);
        let payloads = encode(&bork, nonce)?;
        let groups: Vec<&[Vec<u8>]> = payloads.chunks(per_tx).collect();

        debug!(
            bork_type = %bork.bork_type(),
            transactions = groups.len(),
            inputs = selected.len(),
            input_total,
            needed,
            "Building bork transactions"
        );

        let own_script = self.wallet.script_pubkey();
        let mut remaining = input_total - payment_total;
        let mut previous: Option<OutPoint> = None;
        let mut signed = Vec::with_capacity(groups.len());

        for (index, group) in groups.iter().enumerate() {
            let input = match previous {
                None => selected.iter().map(|utxo| unsigned_input(utxo.outpoint)).collect(),
                Some(outpoint) => vec![unsigned_input(outpoint)],
            };

            let mut output = Vec::with_capacity(group.len() + payments.len() + 1);
            for payload in group.iter() {
                output.push(TxOut {
                    value: Amount::ZERO,
                    script_pubkey: op_return_script(payload)?,
                });
            }
            if index == 0 {
                output.append(&mut payments);
            }

            remaining -= fee;
            let is_last = index + 1 == groups.len();
            if !is_last || remaining >= dust {
                output.push(TxOut {
                    value: Amount::from_sat(remaining),
                    script_pubkey: own_script.clone(),
                });
            }

            let mut tx = Transaction {
                version: Version::ONE,
                lock_time: LockTime::ZERO,
                input,
                output,
            };
            self.wallet.sign(&mut tx)?;

            let txid = tx.compute_txid();
            previous = Some(OutPoint::new(txid, tx.output.len() as u32 - 1));
            debug!(txid = %txid, position = index, "Signed bork transaction");
            signed.push(serialize(&tx));
        }

        info!(
            sender = %self.wallet.address(self.network),
            transactions = signed.len(),
            "Built bork"
        );
        Ok(signed)
    }

    /// Outputs of the input transactions that pay this wallet, deduplicated
    fn collect_utxos(&self, inputs: &[String]) -> Result<Vec<Utxo>, TransactionError> {
        let own_script = self.wallet.script_pubkey();
        let mut seen = HashSet::new();
        let mut utxos = Vec::new();

        for raw in inputs {
            let bytes = hex::decode(raw.trim())
                .map_err(|e| TransactionError::InvalidInput(e.to_string()))?;
            let tx: Transaction =
                deserialize(&bytes).map_err(|e| TransactionError::InvalidInput(e.to_string()))?;
            let txid = tx.compute_txid();

            for (vout, out) in tx.output.iter().enumerate() {
                if out.script_pubkey != own_script {
                    continue;
                }
                let outpoint = OutPoint::new(txid, vout as u32);
                if seen.insert(outpoint) {
                    utxos.push(Utxo {
                        outpoint,
                        value: out.value.to_sat(),
                    });
                }
            }
        }

        Ok(utxos)
    }

    /// Recipient outputs followed by one output per mentioned address
    fn payment_outputs(
        &self,
        outputs: &[Output],
        mentions: &[String],
    ) -> Result<Vec<TxOut>, TransactionError> {
        let mention_value = self.config.mention_value.unwrap_or(self.network.dust_limit());
        let requested = outputs
            .iter()
            .map(|out| (out.address.as_str(), out.value))
            .chain(mentions.iter().map(|address| (address.as_str(), mention_value)));

        let mut payments = Vec::with_capacity(outputs.len() + mentions.len());
        for (address, value) in requested {
            if value == 0 {
                return Err(TransactionError::InvalidAmount(format!(
                    "Output to {} must be positive",
                    address
                )));
            }
            let script_pubkey = address_to_script(address, self.network)
                .map_err(|e| TransactionError::InvalidAddress(e.to_string()))?;
            payments.push(TxOut {
                value: Amount::from_sat(value),
                script_pubkey,
            });
        }
        Ok(payments)
    }

    /// Largest first, ties broken by outpoint so selection is deterministic
    fn select_coins(&self, utxos: &[Utxo], target: u64) -> Result<Vec<Utxo>, TransactionError> {
        let mut sorted: Vec<&Utxo> = utxos.iter().collect();
        sorted.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.outpoint.cmp(&b.outpoint)));

        let mut selected = Vec::new();
        let mut total = 0u64;
        for utxo in sorted {
            selected.push(utxo.clone());
            total = total.saturating_add(utxo.value);

            if total >= target {
                if selected.len() > self.config.max_inputs {
                    return Err(TransactionError::TooManyInputs {
                        count: selected.len(),
                        max: self.config.max_inputs,
                    });
                }
                return Ok(selected);
            }
        }

        Err(TransactionError::InsufficientFunds {
            needed: target,
            available: total,
        })
    }
}

/// First byte of `sha256(txid || vout)` of the first coin spent
fn nonce_for(outpoint: &OutPoint) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(outpoint.txid.to_byte_array());
    hasher.update(outpoint.vout.to_le_bytes());
    hasher.finalize()[0]
}

fn unsigned_input(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}
