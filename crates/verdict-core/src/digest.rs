//! # Content Digests
//!
//! SHA-256 digests used for evidence content addressing, the audit hash
//! chain, and reproducible juror selection.
//!
//! JSON digests hash the `serde_json` serialization. Struct fields serialize
//! in declaration order and `serde_json::Value` maps are key-sorted, so the
//! byte stream is deterministic for any given value.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; 32]);

impl ContentDigest {
    /// The all-zero digest, used as the genesis link of a hash chain.
    pub const ZERO: ContentDigest = ContentDigest([0u8; 32]);

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// The first eight bytes as a big-endian integer.
    ///
    /// Used as a sort key where a uniformly distributed, reproducible
    /// ordering is needed.
    pub fn prefix_u64(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_be_bytes(head)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// SHA-256 over raw bytes.
pub fn sha256_bytes(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest(bytes)
}

/// SHA-256 over the JSON serialization of `value`.
pub fn sha256_json<T: Serialize>(value: &T) -> Result<ContentDigest, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(sha256_bytes(&bytes))
}
