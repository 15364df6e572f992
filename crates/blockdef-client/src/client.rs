//! Version client contract for building-block definitions.
//!
//! The backend owns definition identity and version numbering. The
//! engine only ever asks it to:
//! - `create_version`: append a new draft version to a definition
//! - `update_version`: rewrite a draft version's payload (and request a state change)
//! - `list_versions`: read back the authoritative version records
//!
//! The trait is async and backend-agnostic. An in-memory fake lives in the
//! `fakes` module.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClientResult;

/// Lifecycle state of a single version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    Draft,
    InReview,
    Released,
}

impl VersionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionState::Draft => "draft",
            VersionState::InReview => "in_review",
            VersionState::Released => "released",
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self, VersionState::Released)
    }

    /// Parse the wire representation used in payload `state` fields.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(VersionState::Draft),
            "in_review" => Some(VersionState::InReview),
            "released" => Some(VersionState::Released),
            _ => None,
        }
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version record as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDto {
    /// Server-assigned version identifier
    pub uuid: Uuid,
    /// Owning definition
    pub definition: Uuid,
    /// Monotonic version number, starting at 1
    pub number: u32,
    /// Current lifecycle state
    pub state: VersionState,
    /// Resource-specific payload, opaque to the client
    pub payload: serde_json::Value,
    /// When the version was created
    pub created_at: DateTime<Utc>,
    /// When the version was last written
    pub updated_at: DateTime<Utc>,
}

/// Versioned-definition backend.
///
/// Guarantees:
/// - `list_versions` of an existing definition is never empty.
/// - `create_version` numbers the new version `max + 1` and starts it as draft.
/// - `update_version` only succeeds on draft versions.
#[async_trait]
pub trait VersionClient: Send + Sync {
    /// Append a new draft version to a definition.
    async fn create_version(
        &self,
        definition_id: Uuid,
        payload: &serde_json::Value,
    ) -> ClientResult<VersionDto>;

    /// Replace the payload of a draft version owned by `workspace`.
    async fn update_version(
        &self,
        version_id: Uuid,
        workspace: &str,
        payload: &serde_json::Value,
    ) -> ClientResult<VersionDto>;

    /// List every version of a definition, in backend order.
    async fn list_versions(&self, definition_id: Uuid) -> ClientResult<Vec<VersionDto>>;
}
