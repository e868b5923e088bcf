//! Address encoding
//!
//! Base58check P2PKH/P2SH addresses with per-network version bytes, plus
//! bech32 witness addresses on chains that have segwit. Script templates are
//! the same on every chain; only the textual form differs.

use bech32::{u5, FromBase32, ToBase32, Variant};
use bitcoin::hashes::Hash;
use bitcoin::{PubkeyHash, Script, ScriptBuf, ScriptHash};
use ripemd::{Digest as RipemdDigest, Ripemd160};
use sha2::{Digest, Sha256};

use crate::error::ProtocolError;
use crate::network::Network;

/// Length of a decoded base58check address: version byte plus hash160
pub const ADDRESS_PAYLOAD_LEN: usize = 21;

const OP_0: u8 = 0x00;
const OP_1: u8 = 0x51;
const OP_16: u8 = 0x60;
const OP_CHECKSIG: u8 = 0xac;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256 = Sha256::digest(data);
    let ripemd160 = Ripemd160::digest(sha256);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd160);
    out
}

/// SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(Sha256::digest(data)));
    out
}

/// Base58 encode `payload` followed by the first 4 bytes of its double SHA256
pub fn encode_base58check(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut versioned = Vec::with_capacity(payload.len() + 4);
    versioned.extend_from_slice(payload);
    versioned.extend_from_slice(&checksum[..4]);
    bs58::encode(versioned).into_string()
}

/// Decode a base58check string and verify its checksum. The returned bytes
/// still include the version byte.
pub fn decode_base58check(s: &str) -> Result<Vec<u8>, ProtocolError> {
    let mut data = bs58::decode(s)
        .into_vec()
        .map_err(|e| ProtocolError::InvalidAddress(format!("{}: {}", s, e)))?;
    if data.len() < 5 {
        return Err(ProtocolError::InvalidAddress(format!("{}: too short", s)));
    }
    let split = data.len() - 4;
    let checksum = double_sha256(&data[..split]);
    if checksum[..4] != data[split..] {
        return Err(ProtocolError::InvalidAddress(format!("{}: bad checksum", s)));
    }
    data.truncate(split);
    Ok(data)
}

/// Decode an address into its 21-byte `version || hash160` form, regardless
/// of which network the version byte belongs to
pub fn decode_address_payload(s: &str) -> Result<[u8; ADDRESS_PAYLOAD_LEN], ProtocolError> {
    let data = decode_base58check(s)?;
    if data.len() != ADDRESS_PAYLOAD_LEN {
        return Err(ProtocolError::InvalidAddress(format!(
            "{}: expected {} bytes, got {}",
            s,
            ADDRESS_PAYLOAD_LEN,
            data.len()
        )));
    }
    let mut out = [0u8; ADDRESS_PAYLOAD_LEN];
    out.copy_from_slice(&data);
    Ok(out)
}

pub fn p2pkh_address(pubkey_hash: &[u8; 20], network: Network) -> String {
    let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    payload.push(network.params().p2pkh_version);
    payload.extend_from_slice(pubkey_hash);
    encode_base58check(&payload)
}

pub fn p2sh_address(script_hash: &[u8; 20], network: Network) -> String {
    let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    payload.push(network.params().p2sh_version);
    payload.extend_from_slice(script_hash);
    encode_base58check(&payload)
}

/// P2PKH address of a serialized (compressed or uncompressed) public key
pub fn pubkey_to_address(pubkey: &[u8], network: Network) -> String {
    p2pkh_address(&hash160(pubkey), network)
}

/// P2PKH output script for a public key hash
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*pubkey_hash))
}

/// Bech32 (v0) or bech32m (v1+) address of a witness program
pub fn witness_address(version: u8, program: &[u8], network: Network) -> Option<String> {
    let hrp = network.params().bech32_hrp?;
    let variant = if version == 0 {
        Variant::Bech32
    } else {
        Variant::Bech32m
    };
    let mut data = vec![u5::try_from_u8(version).ok()?];
    data.extend(program.to_base32());
    bech32::encode(hrp, data, variant).ok()
}

/// Address an output script pays to, if it follows a standard template
pub fn script_to_address(script: &Script, network: Network) -> Option<String> {
    let bytes = script.as_bytes();

    if script.is_p2pkh() {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[3..23]);
        return Some(p2pkh_address(&hash, network));
    }

    if script.is_p2sh() {
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&bytes[2..22]);
        return Some(p2sh_address(&hash, network));
    }

    // Pay-to-pubkey, common in early coinbase outputs
    if let Some(&push) = bytes.first() {
        if (push == 33 || push == 65)
            && bytes.len() == push as usize + 2
            && bytes[bytes.len() - 1] == OP_CHECKSIG
        {
            return Some(pubkey_to_address(&bytes[1..=push as usize], network));
        }
    }

    // Witness program: version opcode, single push of 2..=40 bytes
    if bytes.len() >= 4 && bytes.len() <= 42 && bytes[1] as usize == bytes.len() - 2 {
        let version = match bytes[0] {
            OP_0 => Some(0u8),
            op @ OP_1..=OP_16 => Some(op - OP_1 + 1),
            _ => None,
        };
        if let Some(version) = version {
            return witness_address(version, &bytes[2..], network);
        }
    }

    None
}

/// Output script for an address on `network`
pub fn address_to_script(address: &str, network: Network) -> Result<ScriptBuf, ProtocolError> {
    let params = network.params();

    if let Some(hrp) = params.bech32_hrp {
        if address.to_lowercase().starts_with(&format!("{}1", hrp)) {
            return bech32_to_script(address, hrp);
        }
    }

    let payload = decode_address_payload(address)?;
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);

    if payload[0] == params.p2pkh_version {
        Ok(p2pkh_script(&hash))
    } else if payload[0] == params.p2sh_version {
        Ok(ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash)))
    } else {
        Err(ProtocolError::InvalidAddress(format!(
            "{}: version byte {:#04x} is not a {} address",
            address, payload[0], network
        )))
    }
}

fn bech32_to_script(address: &str, expected_hrp: &str) -> Result<ScriptBuf, ProtocolError> {
    let invalid = |reason: &str| ProtocolError::InvalidAddress(format!("{}: {}", address, reason));

    let (hrp, data, variant) = bech32::decode(address).map_err(|e| invalid(&e.to_string()))?;
    if hrp != expected_hrp {
        return Err(invalid("wrong human readable part"));
    }
    let (version, program) = data.split_first().ok_or_else(|| invalid("empty data"))?;
    let version = version.to_u8();
    let program = Vec::<u8>::from_base32(program).map_err(|e| invalid(&e.to_string()))?;

    let expected_variant = if version == 0 {
        Variant::Bech32
    } else {
        Variant::Bech32m
    };
    if variant != expected_variant || version > 16 || program.len() < 2 || program.len() > 40 {
        return Err(invalid("invalid witness program"));
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(invalid("invalid v0 program length"));
    }

    let version_op = if version == 0 { OP_0 } else { OP_1 + version - 1 };
    let mut script = Vec::with_capacity(program.len() + 2);
    script.push(version_op);
    script.push(program.len() as u8);
    script.extend_from_slice(&program);
    Ok(ScriptBuf::from_bytes(script))
}
