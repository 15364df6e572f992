//! Version history of a single definition.
//!
//! A history is never empty and is ordered by ascending version number; the
//! last element is the latest version. Authoritative histories are rebuilt
//! from backend records with [`reconcile`].

use blockdef_client::VersionDto;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PredictorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::domain::error::{BlockDefError, Result};
use crate::domain::payload::hashable_payload;
use crate::domain::version::{PlannedVersion, VersionRecord};
use crate::fingerprint::Fingerprinter;
use crate::knowable::Knowable;
use crate::obs;

/// Non-empty, ascending sequence of versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<VersionRecord>", into = "Vec<VersionRecord>")]
pub struct VersionHistory {
    versions: Vec<VersionRecord>,
}

impl VersionHistory {
    /// Build a history, sorting by number. Fails on an empty list.
    pub fn new(mut versions: Vec<VersionRecord>) -> Result<Self> {
        if versions.is_empty() {
            return Err(BlockDefError::NoVersions);
        }
        versions.sort_by_key(|v| v.number);
        Ok(Self { versions })
    }

    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn latest(&self) -> &VersionRecord {
        &self.versions[self.versions.len() - 1]
    }

    /// Number the next created version receives.
    pub fn next_number(&self) -> u32 {
        self.latest().number + 1
    }

    /// The most recent released version.
    ///
    /// Only the latest and the one before it are considered: a fresh draft
    /// may trail a release, nothing more.
    ///
    /// Returns:
    /// - `Ok(Some(latest))` when the latest version is released
    /// - `Ok(Some(previous))` when only the one before it is released
    /// - `Ok(None)` when no version in the history was ever released,
    ///   including a history of a single unreleased version
    /// - `Err(UnexpectedReleaseState)` when some older version is released
    ///   but neither of the last two is
    pub fn latest_release(&self) -> Result<Option<&VersionRecord>> {
        let latest = self.latest();
        if latest.state.is_released() {
            return Ok(Some(latest));
        }
        let Some(previous) = self.versions.len().checked_sub(2).map(|i| &self.versions[i]) else {
            return Ok(None);
        };
        if previous.state.is_released() {
            return Ok(Some(previous));
        }
        if self.versions.iter().any(|v| v.state.is_released()) {
            return Err(BlockDefError::UnexpectedReleaseState {
                latest_number: latest.number,
                latest_state: latest.state,
                previous_number: previous.number,
                previous_state: previous.state,
            });
        }
        Ok(None)
    }

    /// Every version as a fully known planned version.
    pub fn planned(&self) -> Vec<PlannedVersion> {
        self.versions.iter().map(PlannedVersion::from).collect()
    }
}

impl TryFrom<Vec<VersionRecord>> for VersionHistory {
    type Error = BlockDefError;

    fn try_from(versions: Vec<VersionRecord>) -> Result<Self> {
        VersionHistory::new(versions)
    }
}

impl From<VersionHistory> for Vec<VersionRecord> {
    fn from(history: VersionHistory) -> Self {
        history.versions
    }
}

/// Final state derived from authoritative backend records.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub history: VersionHistory,
    pub version_latest_release: Option<VersionRecord>,
    pub diagnostics: Diagnostics,
}

impl Reconciliation {
    pub fn version_latest(&self) -> &VersionRecord {
        self.history.latest()
    }
}

/// Rebuild a history from backend records.
///
/// Records are sorted by number and every content hash is recomputed from
/// the returned payload. When release was requested (`desired_draft` is
/// `false`) but the latest version is not released yet, the release is
/// waiting for approval: a warning is emitted and `previous_release` is kept.
pub fn reconcile(
    definition_id: Uuid,
    records: Vec<VersionDto>,
    desired_draft: Knowable<bool>,
    previous_release: Option<&VersionRecord>,
    config: &PredictorConfig,
) -> Result<Reconciliation> {
    if records.is_empty() {
        return Err(BlockDefError::NoVersionsFound { definition_id });
    }

    let fingerprinter = Fingerprinter::new(config.fingerprint.clone());
    let versions = records
        .iter()
        .map(|dto| -> Result<VersionRecord> {
            Ok(VersionRecord {
                uuid: dto.uuid,
                number: dto.number,
                state: dto.state,
                content_hash: fingerprinter
                    .fingerprint_value(&hashable_payload(&dto.payload, config))?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let history = VersionHistory::new(versions)?;

    let mut diagnostics = Diagnostics::new();
    let latest = history.latest();
    let version_latest_release = if desired_draft == Knowable::Known(false)
        && !latest.state.is_released()
    {
        obs::emit_pending_approval(&definition_id, latest.number, latest.state);
        diagnostics.push(Diagnostic::warning(
            DiagnosticKind::PendingApproval,
            "Release pending approval",
            format!(
                "version {} was submitted for release but is still {}; \
                 it will be released once approved",
                latest.number, latest.state
            ),
        ));
        previous_release.cloned()
    } else {
        history.latest_release()?.cloned()
    };

    obs::emit_reconciled(&definition_id, history.len(), latest.number, latest.state);

    Ok(Reconciliation {
        history,
        version_latest_release,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::version::VersionState;
    use crate::fingerprint::fingerprint;
    use serde_json::json;

    fn record(number: u32, state: VersionState) -> VersionRecord {
        VersionRecord {
            uuid: Uuid::new_v4(),
            number,
            state,
            content_hash: fingerprint(&json!({"n": number})).expect("fingerprint"),
        }
    }

    #[test]
    fn test_new_sorts_and_rejects_empty() {
        assert!(matches!(
            VersionHistory::new(vec![]),
            Err(BlockDefError::NoVersions)
        ));
        let history = VersionHistory::new(vec![
            record(2, VersionState::Draft),
            record(1, VersionState::Released),
        ])
        .expect("history");
        assert_eq!(history.latest().number, 2);
        assert_eq!(history.next_number(), 3);
    }

    #[test]
    fn test_latest_release_of_fresh_definition_is_absent() {
        let history = VersionHistory::new(vec![record(1, VersionState::Draft)]).expect("history");
        assert_eq!(history.latest_release().expect("release"), None);
    }

    #[test]
    fn test_latest_release_skips_trailing_draft() {
        let history = VersionHistory::new(vec![
            record(1, VersionState::Released),
            record(2, VersionState::Released),
            record(3, VersionState::InReview),
        ])
        .expect("history");
        assert_eq!(history.latest_release().expect("release").map(|v| v.number), Some(2));
    }

    #[test]
    fn test_latest_release_two_trailing_drafts_is_inconsistent() {
        let history = VersionHistory::new(vec![
            record(1, VersionState::Released),
            record(2, VersionState::Draft),
            record(3, VersionState::Draft),
        ])
        .expect("history");
        assert!(matches!(
            history.latest_release(),
            Err(BlockDefError::UnexpectedReleaseState {
                latest_number: 3,
                previous_number: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_latest_release_never_released_is_absent() {
        let history = VersionHistory::new(vec![
            record(1, VersionState::Draft),
            record(2, VersionState::InReview),
            record(3, VersionState::Draft),
        ])
        .expect("history");
        assert_eq!(history.latest_release().expect("release"), None);
    }

    #[test]
    fn test_latest_release_when_latest_follows_draft() {
        let history = VersionHistory::new(vec![
            record(2, VersionState::Released),
            record(1, VersionState::Draft),
        ])
        .expect("history");
        assert_eq!(history.latest_release().expect("release").map(|v| v.number), Some(2));
    }

    #[test]
    fn test_serde_rejects_empty_history() {
        assert!(serde_json::from_str::<VersionHistory>("[]").is_err());
    }
}
