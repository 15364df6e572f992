//! Domain-level error taxonomy for blockdef.

use blockdef_client::{ClientError, VersionState};
use uuid::Uuid;

/// Blockdef domain errors.
#[derive(Debug, thiserror::Error)]
pub enum BlockDefError {
    #[error("definition has no versions")]
    NoVersions,

    #[error("backend returned no versions for definition {definition_id}")]
    NoVersionsFound { definition_id: Uuid },

    #[error(
        "version {number} is {state} and immutable: content hash would change from {stored} to {desired}"
    )]
    ImmutableVersionModified {
        number: u32,
        state: VersionState,
        stored: String,
        desired: String,
    },

    #[error("version {number} is released: secrets at {} cannot be rotated without a new draft", .paths.join(", "))]
    SecretRotationOnReleased { number: u32, paths: Vec<String> },

    #[error(
        "unexpected release state: neither version {latest_number} ({latest_state}) nor version {previous_number} ({previous_state}) is released"
    )]
    UnexpectedReleaseState {
        latest_number: u32,
        latest_state: VersionState,
        previous_number: u32,
        previous_state: VersionState,
    },

    #[error("content hash inconsistency on version {number}: planned {planned}, backend has {actual}")]
    ContentHashInconsistency {
        number: u32,
        planned: String,
        actual: String,
    },

    #[error("disallowed key with non-empty value at '{path}'")]
    DisallowedKey { path: String },

    #[error("non-finite number at '{path}'")]
    NonFiniteNumber { path: String },

    #[error("invalid content hash: {0}")]
    InvalidContentHash(String),

    #[error("invalid desired state: {0}")]
    InvalidDesiredState(String),

    #[error("{operation} failed (definition {definition_id}{}): {source}", version_suffix(.version_id))]
    Upstream {
        operation: &'static str,
        definition_id: Uuid,
        version_id: Option<Uuid>,
        #[source]
        source: ClientError,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn version_suffix(version_id: &Option<Uuid>) -> String {
    version_id
        .map(|id| format!(", version {id}"))
        .unwrap_or_default()
}

/// Result type for blockdef domain operations.
pub type Result<T> = std::result::Result<T, BlockDefError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_error_names_both_hashes() {
        let err = BlockDefError::ImmutableVersionModified {
            number: 3,
            state: VersionState::Released,
            stored: "v1:aaa".to_string(),
            desired: "v1:bbb".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("version 3 is released"));
        assert!(msg.contains("v1:aaa"));
        assert!(msg.contains("v1:bbb"));
    }

    #[test]
    fn test_upstream_error_carries_ids() {
        let definition_id = Uuid::new_v4();
        let version_id = Uuid::new_v4();
        let err = BlockDefError::Upstream {
            operation: "update_version",
            definition_id,
            version_id: Some(version_id),
            source: ClientError::Transport("timeout".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("update_version"));
        assert!(msg.contains(&definition_id.to_string()));
        assert!(msg.contains(&version_id.to_string()));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_rotation_error_lists_paths() {
        let err = BlockDefError::SecretRotationOnReleased {
            number: 2,
            paths: vec!["token".to_string(), "inputs[0]".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("version 2 is released"));
        assert!(msg.contains("token, inputs[0]"));
    }

    #[test]
    fn test_disallowed_key_error() {
        let err = BlockDefError::DisallowedKey {
            path: "inputs[0].plaintext".to_string(),
        };
        assert!(err.to_string().contains("inputs[0].plaintext"));
    }
}
