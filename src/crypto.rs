//! Token generation and secret hashing.
//!
//! Download tokens are 256-bit random values. Only a salted SHA-256 hash is
//! persisted, so a leaked database cannot be replayed against `/download-course`.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Raw token size in bytes (256 bits of entropy)
const TOKEN_BYTES: usize = 32;

/// Generate a fresh download token as lowercase hex (64 chars).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a secret for database lookups (download tokens).
/// Uses SHA-256 with application salt, returns lowercase hex string.
pub fn hash_secret(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"coursedrop-v1:");
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two secrets without leaking the position of the first mismatch.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = provided.as_bytes();
    let b = expected.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
