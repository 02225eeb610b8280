//! Content hashing utilities.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh3::xxh3_64;

/// Fast non-cryptographic hash used for structural equality checks.
pub fn content_hash(data: &[u8]) -> u64 {
    xxh3_64(data)
}

/// SHA-256 of `data` as lowercase hex, the checksum recorded in SBOMs.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
