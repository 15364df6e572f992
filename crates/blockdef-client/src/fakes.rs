//! In-memory fake for the version client (testing only)
//!
//! `MemoryVersionClient` satisfies the [`VersionClient`] contract without
//! any network access. It can also simulate backend quirks: release
//! approval, transport outages, and payload rewriting.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::client::{VersionClient, VersionDto, VersionState};
use crate::error::{ClientError, ClientResult};

#[derive(Debug)]
struct DefinitionEntry {
    workspace: String,
    versions: Vec<VersionDto>,
}

#[derive(Debug, Default)]
struct Inner {
    definitions: HashMap<Uuid, DefinitionEntry>,
    calls: Vec<String>,
    injected: serde_json::Map<String, Value>,
}

/// In-memory backend keyed by definition id.
#[derive(Debug, Default)]
pub struct MemoryVersionClient {
    inner: Mutex<Inner>,
    require_approval: bool,
    unavailable: Mutex<bool>,
}

impl MemoryVersionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release requests park the version in `in_review` until [`approve`](Self::approve).
    pub fn with_required_approval(mut self) -> Self {
        self.require_approval = true;
        self
    }

    /// Every stored payload gets `key = value` merged in, simulating a
    /// backend that accepts something other than what was sent.
    pub fn with_injected_field(self, key: impl Into<String>, value: Value) -> Self {
        self.inner
            .lock()
            .unwrap()
            .injected
            .insert(key.into(), value);
        self
    }

    /// Toggle a simulated outage; every call fails with `Transport` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Create a definition owned by `workspace`, seeded with draft version 1.
    pub fn create_definition(&self, workspace: &str) -> Uuid {
        let definition_id = Uuid::new_v4();
        let now = Utc::now();
        let seed = VersionDto {
            uuid: Uuid::new_v4(),
            definition: definition_id,
            number: 1,
            state: VersionState::Draft,
            payload: Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.lock().unwrap();
        let payload = stamp_payload(&seed, &Value::Null, &inner.injected);
        inner.definitions.insert(
            definition_id,
            DefinitionEntry {
                workspace: workspace.to_string(),
                versions: vec![VersionDto { payload, ..seed }],
            },
        );
        definition_id
    }

    /// Approve a version waiting in review.
    pub fn approve(&self, version_id: Uuid) -> ClientResult<VersionDto> {
        let mut inner = self.inner.lock().unwrap();
        let injected = inner.injected.clone();
        let version = find_version(&mut inner, version_id)?;
        if version.state != VersionState::InReview {
            return Err(ClientError::VersionImmutable {
                version_id,
                state: version.state,
            });
        }
        version.state = VersionState::Released;
        version.updated_at = Utc::now();
        let original = version.payload.clone();
        version.payload = stamp_payload(version, &original, &injected);
        Ok(version.clone())
    }

    /// Operations served so far, in order (e.g. `"update_version"`).
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn check_available(&self, op: &str) -> ClientResult<()> {
        self.inner.lock().unwrap().calls.push(op.to_string());
        if *self.unavailable.lock().unwrap() {
            return Err(ClientError::Transport(format!("{op}: backend unavailable")));
        }
        Ok(())
    }
}

fn find_version(inner: &mut Inner, version_id: Uuid) -> ClientResult<&mut VersionDto> {
    inner
        .definitions
        .values_mut()
        .flat_map(|d| d.versions.iter_mut())
        .find(|v| v.uuid == version_id)
        .ok_or(ClientError::VersionNotFound { version_id })
}

/// Echo control fields into the stored payload the way a real backend does.
fn stamp_payload(
    version: &VersionDto,
    payload: &Value,
    injected: &serde_json::Map<String, Value>,
) -> Value {
    let mut map = match payload {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    for (k, v) in injected {
        map.insert(k.clone(), v.clone());
    }
    map.insert("number".to_string(), Value::from(version.number));
    map.insert("state".to_string(), Value::from(version.state.as_str()));
    map.insert(
        "definition".to_string(),
        Value::from(version.definition.to_string()),
    );
    Value::Object(map)
}

fn requested_state(payload: &Value) -> Option<VersionState> {
    payload
        .get("state")
        .and_then(Value::as_str)
        .and_then(VersionState::parse)
}

#[async_trait]
impl VersionClient for MemoryVersionClient {
    async fn create_version(
        &self,
        definition_id: Uuid,
        payload: &Value,
    ) -> ClientResult<VersionDto> {
        self.check_available("create_version")?;
        if !payload.is_object() {
            return Err(ClientError::InvalidPayload(
                "payload must be an object".to_string(),
            ));
        }
        let mut inner = self.inner.lock().unwrap();
        let injected = inner.injected.clone();
        let entry = inner
            .definitions
            .get_mut(&definition_id)
            .ok_or(ClientError::DefinitionNotFound { definition_id })?;
        let number = entry.versions.iter().map(|v| v.number).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let mut version = VersionDto {
            uuid: Uuid::new_v4(),
            definition: definition_id,
            number,
            state: VersionState::Draft,
            payload: Value::Null,
            created_at: now,
            updated_at: now,
        };
        version.payload = stamp_payload(&version, payload, &injected);
        entry.versions.push(version.clone());
        debug!(definition_id = %definition_id, number, "fake: version created");
        Ok(version)
    }

    async fn update_version(
        &self,
        version_id: Uuid,
        workspace: &str,
        payload: &Value,
    ) -> ClientResult<VersionDto> {
        self.check_available("update_version")?;
        if !payload.is_object() {
            return Err(ClientError::InvalidPayload(
                "payload must be an object".to_string(),
            ));
        }
        let require_approval = self.require_approval;
        let mut inner = self.inner.lock().unwrap();
        let injected = inner.injected.clone();
        let owner = inner
            .definitions
            .values()
            .find(|d| d.versions.iter().any(|v| v.uuid == version_id))
            .map(|d| d.workspace.clone())
            .ok_or(ClientError::VersionNotFound { version_id })?;
        if owner != workspace {
            return Err(ClientError::WorkspaceMismatch {
                version_id,
                workspace: workspace.to_string(),
            });
        }

        let version = find_version(&mut inner, version_id)?;
        if version.state != VersionState::Draft {
            return Err(ClientError::VersionImmutable {
                version_id,
                state: version.state,
            });
        }
        version.state = match requested_state(payload) {
            Some(VersionState::Released) if require_approval => VersionState::InReview,
            Some(VersionState::Released) => VersionState::Released,
            _ => VersionState::Draft,
        };
        version.updated_at = Utc::now();
        version.payload = stamp_payload(version, payload, &injected);
        debug!(version_id = %version_id, state = %version.state, "fake: version updated");
        Ok(version.clone())
    }

    async fn list_versions(&self, definition_id: Uuid) -> ClientResult<Vec<VersionDto>> {
        self.check_available("list_versions")?;
        let inner = self.inner.lock().unwrap();
        let entry = inner
            .definitions
            .get(&definition_id)
            .ok_or(ClientError::DefinitionNotFound { definition_id })?;
        // Newest first, so callers cannot rely on backend ordering.
        let mut versions = entry.versions.clone();
        versions.reverse();
        Ok(versions)
    }
}
