//! Derived signing key

use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{ScriptBuf, Transaction};
use borker_core::address::{encode_base58check, hash160, p2pkh_address, p2pkh_script};
use borker_core::{Network, NewBorkData};
use std::fmt;

use crate::transaction_builder::{BorkTransactionBuilder, BuilderConfig, Output, TransactionError};

/// Key pair derived from a [`Wallet`](crate::Wallet) at a fixed path
#[derive(Clone)]
pub struct ChildWallet {
    path: Vec<u32>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl ChildWallet {
    pub(crate) fn new(path: Vec<u32>, secret_key: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            path,
            secret_key,
            public_key,
        }
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }

    /// Compressed SEC1 public key
    pub fn public_key(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public_key.serialize())
    }

    /// P2PKH address with the network's version byte
    pub fn address(&self, network: Network) -> String {
        p2pkh_address(&self.pubkey_hash(), network)
    }

    /// P2PKH output script, the same on every network
    pub fn script_pubkey(&self) -> ScriptBuf {
        p2pkh_script(&self.pubkey_hash())
    }

    /// Private key in wallet import format (compressed)
    pub fn to_wif(&self, network: Network) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(network.params().wif_version);
        payload.extend_from_slice(&self.secret_key.secret_bytes());
        payload.push(0x01);
        encode_base58check(&payload)
    }

    /// Sign every input of `tx` as a spend of this key's P2PKH output, using
    /// the legacy `SIGHASH_ALL` digest
    pub fn sign(&self, tx: &mut Transaction) -> Result<(), TransactionError> {
        let secp = Secp256k1::signing_only();
        let script_code = self.script_pubkey();
        let pubkey = bitcoin::PublicKey::new(self.public_key);

        let mut script_sigs = Vec::with_capacity(tx.input.len());
        {
            let cache = SighashCache::new(&*tx);
            for index in 0..tx.input.len() {
                let sighash = cache
                    .legacy_signature_hash(index, &script_code, EcdsaSighashType::All.to_u32())
                    .map_err(|e| TransactionError::Signing(e.to_string()))?;
                let message = Message::from_digest(sighash.to_byte_array());
                let signature = secp.sign_ecdsa(&message, &self.secret_key);

                let mut sig = signature.serialize_der().to_vec();
                sig.push(EcdsaSighashType::All as u8);

                let script_sig = Builder::new()
                    .push_slice(
                        PushBytesBuf::try_from(sig)
                            .map_err(|e| TransactionError::Signing(e.to_string()))?,
                    )
                    .push_key(&pubkey)
                    .into_script();
                script_sigs.push(script_sig);
            }
        }

        for (input, script_sig) in tx.input.iter_mut().zip(script_sigs) {
            input.script_sig = script_sig;
        }
        Ok(())
    }

    /// Build and sign the transactions publishing `data`, with the default
    /// builder configuration. Returned in dependency order.
    /// Addresses in `mentions` must be `@` mentioned in the content.
    pub fn new_bork(
        &self,
        data: NewBorkData,
        inputs: &[String],
        outputs: &[Output],
        mentions: &[String],
        fee: u64,
        network: Network,
    ) -> Result<Vec<Vec<u8>>, TransactionError> {
        BorkTransactionBuilder::new(self, network, BuilderConfig::default())
            .build(data, inputs, outputs, mentions, fee)
    }
}

impl fmt::Debug for ChildWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildWallet")
            .field("path", &self.path)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
