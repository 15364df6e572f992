//! Engine configuration.
//!
//! Key names the engine treats specially are configuration, not constants:
//! the same engine serves payload schemas that name their control fields
//! and secrets differently.

use serde::{Deserialize, Serialize};

/// Keys the fingerprint engine clears, drops, or refuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Version-control metadata cleared before hashing.
    pub control_fields: Vec<String>,
    /// Keys that abort hashing when present with a non-empty value.
    pub denied_keys: Vec<String>,
    /// Keys dropped from the canonical tree wherever they appear.
    pub excluded_keys: Vec<String>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            control_fields: vec![
                "number".to_string(),
                "state".to_string(),
                "definition".to_string(),
            ],
            denied_keys: vec!["plaintext".to_string(), "definition".to_string()],
            excluded_keys: vec!["secret_ref".to_string()],
        }
    }
}

impl FingerprintConfig {
    pub fn is_control_field(&self, key: &str) -> bool {
        self.control_fields.iter().any(|k| k == key)
    }

    pub fn is_denied(&self, key: &str) -> bool {
        self.denied_keys.iter().any(|k| k == key)
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.excluded_keys.iter().any(|k| k == key)
    }
}

/// Configuration for the plan-time predictor and the applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub fingerprint: FingerprintConfig,
    /// Name of the draft flag inside desired configuration.
    pub draft_key: String,
    /// Key marking a secret node; its value is the secret reference.
    pub secret_ref_key: String,
    /// Key holding a secret's plaintext inside a secret node.
    pub secret_plaintext_key: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintConfig::default(),
            draft_key: "draft".to_string(),
            secret_ref_key: "secret_ref".to_string(),
            secret_plaintext_key: "plaintext".to_string(),
        }
    }
}

impl PredictorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the hash denylist
    pub fn with_denied_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fingerprint.denied_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the secret reference key; it is also excluded from hashing
    pub fn with_secret_ref_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        let old = std::mem::replace(&mut self.secret_ref_key, key.clone());
        self.fingerprint.excluded_keys.retain(|k| *k != old);
        if !self.fingerprint.is_excluded(&key) {
            self.fingerprint.excluded_keys.push(key);
        }
        self
    }

    /// Set the secret plaintext key
    pub fn with_secret_plaintext_key(mut self, key: impl Into<String>) -> Self {
        self.secret_plaintext_key = key.into();
        self
    }

    /// Set the draft flag key
    pub fn with_draft_key(mut self, key: impl Into<String>) -> Self {
        self.draft_key = key.into();
        self
    }

    /// Create from environment variables, falling back to defaults
    ///
    /// Reads:
    /// - BLOCKDEF_HASH_DENYLIST (optional, comma separated)
    /// - BLOCKDEF_SECRET_REF_KEY (optional, default: "secret_ref")
    /// - BLOCKDEF_SECRET_PLAINTEXT_KEY (optional, default: "plaintext")
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(list) = std::env::var("BLOCKDEF_HASH_DENYLIST") {
            config = config.with_denied_keys(
                list.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string),
            );
        }
        if let Ok(key) = std::env::var("BLOCKDEF_SECRET_REF_KEY") {
            config = config.with_secret_ref_key(key);
        }
        if let Ok(key) = std::env::var("BLOCKDEF_SECRET_PLAINTEXT_KEY") {
            config = config.with_secret_plaintext_key(key);
        }
        config
    }
}
