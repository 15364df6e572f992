//! Error types for blockdef-client

use thiserror::Error;
use uuid::Uuid;

use crate::client::VersionState;

/// Errors returned by a [`VersionClient`](crate::VersionClient) backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The definition does not exist on the backend
    #[error("definition not found: {definition_id}")]
    DefinitionNotFound { definition_id: Uuid },

    /// The version does not exist on the backend
    #[error("version not found: {version_id}")]
    VersionNotFound { version_id: Uuid },

    /// The caller named a workspace that does not own the version
    #[error("version {version_id} is not owned by workspace '{workspace}'")]
    WorkspaceMismatch { version_id: Uuid, workspace: String },

    /// Only draft versions accept payload updates
    #[error("version {version_id} is {state} and cannot be updated")]
    VersionImmutable {
        version_id: Uuid,
        state: VersionState,
    },

    /// The payload was rejected by the backend
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The backend could not be reached
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;
