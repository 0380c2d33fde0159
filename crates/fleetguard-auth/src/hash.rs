//! One-way token hashing for session lookups.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of a raw token.
///
/// Raw tokens are never persisted; sessions are keyed by this digest.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
