//! Content fingerprints for version payloads.
//!
//! A fingerprint is `"v1:" + sha256(canonical tree)` in lowercase hex. The
//! scheme prefix lets a future hash scheme coexist with stored `v1` values.
//!
//! Callers clear version-control fields (`number`, `state`, the definition
//! back-reference) before hashing; see
//! [`strip_control_fields`](crate::domain::payload::strip_control_fields).

pub mod canonical;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::FingerprintConfig;
use crate::domain::error::{BlockDefError, Result};

pub use canonical::{canonicalize, CanonicalNode, DenylistVisitor, NodeVisitor};

/// Prefix of the current hash scheme.
pub const HASH_SCHEME_V1: &str = "v1:";

/// A versioned content hash, e.g. `v1:9f86d08...`.
///
/// The inner string is private so it always carries a known scheme prefix
/// and a 64-char lowercase hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    fn from_digest(digest: &[u8]) -> Self {
        ContentHash(format!("{HASH_SCHEME_V1}{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digest without the scheme prefix.
    pub fn digest_hex(&self) -> &str {
        &self.0[HASH_SCHEME_V1.len()..]
    }

    /// Short form (scheme plus first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..(HASH_SCHEME_V1.len() + 12).min(self.0.len())]
    }
}

impl TryFrom<String> for ContentHash {
    type Error = BlockDefError;

    fn try_from(s: String) -> Result<Self> {
        let digest = s
            .strip_prefix(HASH_SCHEME_V1)
            .ok_or_else(|| BlockDefError::InvalidContentHash(format!("unknown scheme: {s}")))?;
        if digest.len() != 64
            || !digest
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(BlockDefError::InvalidContentHash(s));
        }
        Ok(ContentHash(s))
    }
}

impl FromStr for ContentHash {
    type Err = BlockDefError;

    fn from_str(s: &str) -> Result<Self> {
        ContentHash::try_from(s.to_string())
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes fingerprints under a fixed [`FingerprintConfig`].
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    config: FingerprintConfig,
}

impl Fingerprinter {
    pub fn new(config: FingerprintConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Encode `payload` generically, canonicalize, check the denylist, hash.
    pub fn fingerprint<T: Serialize + ?Sized>(&self, payload: &T) -> Result<ContentHash> {
        let value = serde_json::to_value(payload)?;
        self.fingerprint_value(&value)
    }

    pub fn fingerprint_value(&self, value: &serde_json::Value) -> Result<ContentHash> {
        let canonical = self.canonical_json(value)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(ContentHash::from_digest(&hasher.finalize()))
    }

    /// Compact canonical JSON that the hash is computed over.
    pub fn canonical_json(&self, value: &serde_json::Value) -> Result<String> {
        let node = canonicalize(value, &self.config)?;
        node.walk(&mut DenylistVisitor::new(&self.config))?;
        Ok(serde_json::to_string(&node)?)
    }
}

/// Fingerprint with the default configuration.
pub fn fingerprint<T: Serialize + ?Sized>(payload: &T) -> Result<ContentHash> {
    Fingerprinter::default().fingerprint(payload)
}
