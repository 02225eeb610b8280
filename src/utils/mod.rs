//! Shared utilities.

mod hash;
mod version;

pub use hash::{content_hash, sha256_hex};
pub use version::compare_versions;
