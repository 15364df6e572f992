//! Version records: persisted and planned.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::ContentHash;
use crate::knowable::Knowable;

pub use blockdef_client::VersionState;

/// The externally visible identity of a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub uuid: Uuid,
    pub number: u32,
    pub state: VersionState,
    pub content_hash: ContentHash,
}

/// A version as predicted at plan time; any field may be unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedVersion {
    pub uuid: Knowable<Uuid>,
    pub number: Knowable<u32>,
    pub state: Knowable<VersionState>,
    pub content_hash: Knowable<ContentHash>,
}

impl PlannedVersion {
    /// Every field unknown.
    pub fn unknown() -> Self {
        Self {
            uuid: Knowable::Unknown,
            number: Knowable::Unknown,
            state: Knowable::Unknown,
            content_hash: Knowable::Unknown,
        }
    }

    pub fn is_fully_known(&self) -> bool {
        self.uuid.is_known()
            && self.number.is_known()
            && self.state.is_known()
            && self.content_hash.is_known()
    }

    /// Back to a record, if nothing is unknown.
    pub fn to_record(&self) -> Option<VersionRecord> {
        Some(VersionRecord {
            uuid: *self.uuid.known()?,
            number: *self.number.known()?,
            state: *self.state.known()?,
            content_hash: self.content_hash.known()?.clone(),
        })
    }
}

impl From<&VersionRecord> for PlannedVersion {
    fn from(record: &VersionRecord) -> Self {
        Self {
            uuid: Knowable::Known(record.uuid),
            number: Knowable::Known(record.number),
            state: Knowable::Known(record.state),
            content_hash: Knowable::Known(record.content_hash.clone()),
        }
    }
}

impl From<VersionRecord> for PlannedVersion {
    fn from(record: VersionRecord) -> Self {
        PlannedVersion::from(&record)
    }
}
