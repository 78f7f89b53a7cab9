//! Base58Check addresses
//!
//! A QC address is `Base58(version || HASH160(pubkey) || checksum4)` with
//! version byte `0x00` and the checksum being the first four bytes of the
//! double-SHA256 of `version || HASH160`.

use crate::crypto::{checksum4, hash160};
use crate::{CoreError, PubKeyHash, Result};

/// Address version byte
pub const ADDRESS_VERSION: u8 = 0x00;

/// Derive the Base58Check address for a 65-byte uncompressed public key
pub fn pubkey_to_address(pubkey: &[u8]) -> String {
    let pkh = hash160(pubkey);
    encode_pubkey_hash(&pkh)
}

/// Encode a 20-byte public-key hash as a Base58Check address
pub fn encode_pubkey_hash(pkh: &PubKeyHash) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pkh);
    let checksum = checksum4(&payload);
    payload.extend_from_slice(&checksum);
    bs58::encode(payload).into_string()
}

/// Decode an address back to its public-key hash.
///
/// Fails on out-of-alphabet characters, short payloads, checksum mismatch,
/// and any payload that is not exactly 20 bytes.
pub fn decode_address(address: &str) -> Result<PubKeyHash> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|_| CoreError::InvalidAddress(address.to_string()))?;
    if decoded.len() < 5 {
        return Err(CoreError::InvalidAddress(address.to_string()));
    }
    let (body, checksum) = decoded.split_at(decoded.len() - 4);
    if checksum4(body).as_slice() != checksum {
        return Err(CoreError::InvalidAddress(address.to_string()));
    }
    let payload = &body[1..];
    if payload.len() != 20 {
        return Err(CoreError::InvalidAddress(address.to_string()));
    }
    let mut pkh = [0u8; 20];
    pkh.copy_from_slice(payload);
    Ok(pkh)
}

/// True iff the address decodes and its checksum matches
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_ok()
}
