//! Seat credentials
//!
//! Each seat of a match gets a random secret; only its SHA-256 digest is
//! stored.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes per secret
const SECRET_BYTES: usize = 24;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hex SHA-256 of a secret
pub fn hash_secret(secret: &str) -> String {
    to_hex(&Sha256::digest(secret.as_bytes()))
}

/// Compare a presented secret with a stored hash in constant time
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    let presented = hash_secret(secret);
    if presented.len() != stored_hash.len() {
        return false;
    }
    presented
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Fresh secret and its hash
pub fn generate_secret<R: RngCore>(rng: &mut R) -> (String, String) {
    let mut bytes = [0u8; SECRET_BYTES];
    rng.fill_bytes(&mut bytes);
    let secret = to_hex(&bytes);
    let hash = hash_secret(&secret);
    (secret, hash)
}
