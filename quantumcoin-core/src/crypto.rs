//! Cryptographic primitives
//!
//! SHA-256 / RIPEMD-160 hashing and secp256k1 ECDSA over 32-byte digests.
//! Public keys are always the 65-byte uncompressed `0x04 || X || Y` form;
//! signatures travel as `len(r) || r || len(s) || s` with minimal big-endian
//! components.

use crate::{CoreError, Hash256, PubKeyHash, Result};
use rand::RngCore;
use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// SHA-256
pub fn sha256(data: &[u8]) -> Hash256 {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256 applied twice
pub fn double_sha256(data: &[u8]) -> Hash256 {
    sha256(&sha256(data))
}

/// RIPEMD160(SHA256(x)), the address-hash primitive
pub fn hash160(data: &[u8]) -> PubKeyHash {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    out
}

/// First four bytes of double-SHA256, used as the Base58Check checksum
pub fn checksum4(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Generate a fresh secp256k1 secret key
pub fn generate_secret_key() -> SecretKey {
    let mut rng = rand::thread_rng();
    loop {
        let mut buf = [0u8; 32];
        rng.fill_bytes(&mut buf);
        if let Ok(key) = SecretKey::from_slice(&buf) {
            return key;
        }
    }
}

/// Derive the 65-byte uncompressed public key for a secret key
pub fn uncompressed_pubkey(secret: &SecretKey) -> [u8; 65] {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, secret).serialize_uncompressed()
}

/// Parse a 65-byte uncompressed public key, checking the curve equation
pub fn parse_uncompressed_pubkey(bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(CoreError::Crypto("not an uncompressed public key".to_string()));
    }
    PublicKey::from_slice(bytes).map_err(|e| CoreError::Crypto(format!("invalid public key: {e}")))
}

/// Sign an already-hashed 32-byte digest, returning the length-prefixed
/// `(r, s)` encoding
pub fn sign_digest(secret: &SecretKey, digest: &Hash256) -> Result<Vec<u8>> {
    let secp = Secp256k1::new();
    let message = Message::from_digest_slice(digest)
        .map_err(|e| CoreError::Crypto(format!("invalid message digest: {e}")))?;
    let compact = secp.sign_ecdsa(&message, secret).serialize_compact();
    Ok(encode_signature(&compact[..32], &compact[32..]))
}

/// Verify a length-prefixed `(r, s)` signature over a 32-byte digest.
/// Any malformed input verifies as false.
pub fn verify_digest(pubkey: &[u8], digest: &Hash256, signature: &[u8]) -> bool {
    let Ok(pubkey) = parse_uncompressed_pubkey(pubkey) else {
        return false;
    };
    let Some((r, s)) = decode_signature(signature) else {
        return false;
    };
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r);
    compact[32..].copy_from_slice(&s);
    let Ok(sig) = Signature::from_compact(&compact) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    let secp = Secp256k1::new();
    secp.verify_ecdsa(&message, &sig, &pubkey).is_ok()
}

/// Encode `(r, s)` as `len(r) || r || len(s) || s` with leading zeros
/// stripped from each component
pub fn encode_signature(r: &[u8], s: &[u8]) -> Vec<u8> {
    let r = trim_leading_zeros(r);
    let s = trim_leading_zeros(s);
    let mut out = Vec::with_capacity(2 + r.len() + s.len());
    out.push(r.len() as u8);
    out.extend_from_slice(r);
    out.push(s.len() as u8);
    out.extend_from_slice(s);
    out
}

/// Strict inverse of [`encode_signature`]: components at most 32 bytes,
/// no trailing data. Returns the components left-padded to 32 bytes.
pub fn decode_signature(bytes: &[u8]) -> Option<([u8; 32], [u8; 32])> {
    let (r, rest) = read_component(bytes)?;
    let (s, rest) = read_component(rest)?;
    if !rest.is_empty() {
        return None;
    }
    Some((r, s))
}

fn read_component(bytes: &[u8]) -> Option<([u8; 32], &[u8])> {
    let (&len, rest) = bytes.split_first()?;
    let len = len as usize;
    if len > 32 || rest.len() < len {
        return None;
    }
    let mut out = [0u8; 32];
    out[32 - len..].copy_from_slice(&rest[..len]);
    Some((out, &rest[len..]))
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash160_length() {
        let h = hash160(b"quantumcoin");
        assert_eq!(h.len(), 20);
    }

    #[test]
    fn test_double_sha256_matches_composition() {
        let data = b"test data";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_sign_and_verify() {
        let secret = generate_secret_key();
        let pubkey = uncompressed_pubkey(&secret);
        let digest = sha256(b"hello, chain");

        let sig = sign_digest(&secret, &digest).unwrap();
        assert!(verify_digest(&pubkey, &digest, &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let secret = generate_secret_key();
        let other = generate_secret_key();
        let digest = sha256(b"message");

        let sig = sign_digest(&secret, &digest).unwrap();
        assert!(!verify_digest(&uncompressed_pubkey(&other), &digest, &sig));
    }

    #[test]
    fn test_verify_rejects_corrupted_signature() {
        let secret = generate_secret_key();
        let pubkey = uncompressed_pubkey(&secret);
        let digest = sha256(b"message");

        let mut sig = sign_digest(&secret, &digest).unwrap();
        let last = sig.len() - 1;
        sig[last] ^= 0x01;
        assert!(!verify_digest(&pubkey, &digest, &sig));
    }

    #[test]
    fn test_signature_codec_roundtrip() {
        let r = [0x00, 0x00, 0x12, 0x34];
        let s = [0xff; 32];
        let encoded = encode_signature(&r, &s);
        // leading zeros of r are stripped
        assert_eq!(encoded[0], 2);

        let (dr, ds) = decode_signature(&encoded).unwrap();
        assert_eq!(&dr[30..], &[0x12, 0x34]);
        assert_eq!(ds, s);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut encoded = encode_signature(&[1u8; 32], &[2u8; 32]);
        encoded.push(0x00);
        assert!(decode_signature(&encoded).is_none());
    }

    #[test]
    fn test_decode_rejects_oversized_component() {
        let mut encoded = vec![33u8];
        encoded.extend_from_slice(&[1u8; 33]);
        encoded.push(1);
        encoded.push(2);
        assert!(decode_signature(&encoded).is_none());
    }

    #[test]
    fn test_pubkey_parse_rejects_bad_prefix() {
        let secret = generate_secret_key();
        let mut pubkey = uncompressed_pubkey(&secret);
        pubkey[0] = 0x03;
        assert!(parse_uncompressed_pubkey(&pubkey).is_err());
    }
}
