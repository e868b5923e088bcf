//! Script inspection helpers
//!
//! Reads protocol payloads out of `OP_RETURN` outputs and recovers who signed
//! a transaction input.

use bitcoin::script::{Instruction, PushBytesBuf};
use bitcoin::{Script, ScriptBuf, TxIn};

use crate::address::{hash160, p2sh_address, pubkey_to_address, witness_address};
use crate::error::ProtocolError;
use crate::network::Network;

/// Largest data-carrier payload relayed by default policy
pub const MAX_OP_RETURN_PAYLOAD: usize = 80;

/// Build `OP_RETURN <payload>`
pub fn op_return_script(payload: &[u8]) -> Result<ScriptBuf, ProtocolError> {
    if payload.len() > MAX_OP_RETURN_PAYLOAD {
        return Err(ProtocolError::ContentTooLong {
            len: payload.len(),
            max: MAX_OP_RETURN_PAYLOAD,
        });
    }
    let push = PushBytesBuf::try_from(payload.to_vec())
        .map_err(|e| ProtocolError::InvalidBorkData(e.to_string()))?;
    Ok(ScriptBuf::new_op_return(push))
}

/// Data pushed after `OP_RETURN`, concatenated. `None` for any other script
/// or when a non-push opcode follows.
pub fn op_return_payload(script: &Script) -> Option<Vec<u8>> {
    if !script.is_op_return() {
        return None;
    }

    let mut payload = Vec::new();
    for instruction in script.instructions().skip(1) {
        match instruction.ok()? {
            Instruction::PushBytes(bytes) => payload.extend_from_slice(bytes.as_bytes()),
            Instruction::Op(_) => return None,
        }
    }
    Some(payload)
}

/// How the first input of a transaction was authorised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signer {
    /// `<sig> <pubkey>` in the script sig
    PubkeyHash(Vec<u8>),
    /// Native P2WPKH witness
    WitnessPubkeyHash(Vec<u8>),
    /// P2WPKH nested in P2SH
    NestedWitnessPubkeyHash { redeem_script: Vec<u8>, pubkey: Vec<u8> },
}

fn is_pubkey(bytes: &[u8]) -> bool {
    match bytes.first() {
        Some(0x02) | Some(0x03) => bytes.len() == 33,
        Some(0x04) => bytes.len() == 65,
        _ => false,
    }
}

fn script_pushes(script: &Script) -> Option<Vec<Vec<u8>>> {
    script
        .instructions()
        .map(|instruction| match instruction.ok()? {
            Instruction::PushBytes(bytes) => Some(bytes.as_bytes().to_vec()),
            Instruction::Op(_) => None,
        })
        .collect()
}

impl Signer {
    /// Recover the signing key of an input, if it spends a single-key output
    pub fn from_input(input: &TxIn) -> Option<Signer> {
        if input.witness.len() == 2 {
            let pubkey = input.witness.nth(1)?;
            if !is_pubkey(pubkey) {
                return None;
            }
            if input.script_sig.is_empty() {
                return Some(Signer::WitnessPubkeyHash(pubkey.to_vec()));
            }
            let pushes = script_pushes(&input.script_sig)?;
            return match pushes.as_slice() {
                [redeem] if redeem.len() == 22 && redeem[0] == 0x00 && redeem[1] == 0x14 => {
                    Some(Signer::NestedWitnessPubkeyHash {
                        redeem_script: redeem.clone(),
                        pubkey: pubkey.to_vec(),
                    })
                }
                _ => None,
            };
        }

        let pushes = script_pushes(&input.script_sig)?;
        match pushes.as_slice() {
            [_sig, pubkey] if is_pubkey(pubkey) => Some(Signer::PubkeyHash(pubkey.clone())),
            _ => None,
        }
    }

    pub fn pubkey(&self) -> &[u8] {
        match self {
            Signer::PubkeyHash(pubkey)
            | Signer::WitnessPubkeyHash(pubkey)
            | Signer::NestedWitnessPubkeyHash { pubkey, .. } => pubkey,
        }
    }

    /// Address whose output the input spent
    pub fn address(&self, network: Network) -> Option<String> {
        match self {
            Signer::PubkeyHash(pubkey) => Some(pubkey_to_address(pubkey, network)),
            Signer::WitnessPubkeyHash(pubkey) => witness_address(0, &hash160(pubkey), network),
            Signer::NestedWitnessPubkeyHash { redeem_script, .. } => {
                Some(p2sh_address(&hash160(redeem_script), network))
            }
        }
    }
}
