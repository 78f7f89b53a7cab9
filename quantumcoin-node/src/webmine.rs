//! External web-miner jobs
//!
//! A browser miner asks for a challenge, grinds
//! `SHA256(SHA256(challenge || nonce_LE32))` for a digest with enough
//! leading hex zeros, and submits the nonce. Challenges are bound to the
//! requesting address, derived from the current tip so they cannot be
//! replayed across tips, and expire after sixty seconds.

use quantumcoin_core::crypto::{double_sha256, sha256};
use quantumcoin_core::Hash256;
use rand::RngCore;
use std::time::{Duration, Instant};

/// Leading hex zeros a web solution must reach
pub const WEB_DIFFICULTY_HEX_ZEROS: usize = 5;

/// How long a handed-out challenge stays valid
pub const CHALLENGE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WebChallenge {
    pub challenge: Hash256,
    pub miner: String,
    pub difficulty: usize,
    pub issued: Instant,
}

impl WebChallenge {
    /// Derive a fresh challenge from the tip and eight random bytes
    pub fn issue(tip_hash: &Hash256, tip_index: u32, miner: &str) -> Self {
        let mut random8 = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut random8);

        let mut data = Vec::with_capacity(44);
        data.extend_from_slice(tip_hash);
        data.extend_from_slice(&tip_index.to_be_bytes());
        data.extend_from_slice(&random8);

        Self {
            challenge: sha256(&data),
            miner: miner.to_string(),
            difficulty: WEB_DIFFICULTY_HEX_ZEROS,
            issued: Instant::now(),
        }
    }

    pub fn expired(&self) -> bool {
        self.issued.elapsed() > CHALLENGE_TTL
    }
}

/// Check a submitted nonce: `doubleSHA256(challenge || nonce_LE32)` must
/// start with `difficulty` hex zeros. Returns the verdict and the digest hex.
pub fn verify_solution(challenge: &Hash256, nonce: u32, difficulty: usize) -> (bool, String) {
    let mut input = Vec::with_capacity(36);
    input.extend_from_slice(challenge);
    input.extend_from_slice(&nonce.to_le_bytes());

    let digest_hex = hex::encode(double_sha256(&input));
    let ok = digest_hex.len() >= difficulty
        && digest_hex.as_bytes()[..difficulty].iter().all(|&b| b == b'0');
    (ok, digest_hex)
}
