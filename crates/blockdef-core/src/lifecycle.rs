//! Draft/release lifecycle state machine.
//!
//! The transition is chosen from the stored draft flag and the desired one:
//!
//! | stored | desired | transition    | effect                                   |
//! |--------|---------|---------------|------------------------------------------|
//! | false  | true    | `CreateDraft` | append version `latest + 1` as draft     |
//! | true   | true    | `UpdateDraft` | refresh latest content hash in place     |
//! | true   | false   | `Release`     | latest state and latest release unknown  |
//! | false  | false   | `Unchanged`   | content must match, else immutable error |

use serde::{Deserialize, Serialize};

use crate::domain::error::{BlockDefError, Result};
use crate::domain::version::{PlannedVersion, VersionRecord, VersionState};
use crate::fingerprint::ContentHash;
use crate::history::VersionHistory;
use crate::knowable::Knowable;
use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    CreateDraft,
    UpdateDraft,
    Release,
    Unchanged,
}

impl Transition {
    pub fn select(previous_draft: bool, desired_draft: bool) -> Self {
        match (previous_draft, desired_draft) {
            (false, true) => Transition::CreateDraft,
            (true, true) => Transition::UpdateDraft,
            (true, false) => Transition::Release,
            (false, false) => Transition::Unchanged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::CreateDraft => "create_draft",
            Transition::UpdateDraft => "update_draft",
            Transition::Release => "release",
            Transition::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted history after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub transition: Transition,
    pub versions: Vec<PlannedVersion>,
    pub version_latest_release: Knowable<Option<VersionRecord>>,
}

impl TransitionOutcome {
    pub fn version_latest(&self) -> &PlannedVersion {
        &self.versions[self.versions.len() - 1]
    }
}

/// Inputs to one lifecycle step.
#[derive(Debug, Clone, Copy)]
pub struct TransitionInput<'a> {
    pub history: &'a VersionHistory,
    pub previous_draft: bool,
    pub previous_release: Option<&'a VersionRecord>,
    pub desired_draft: bool,
    /// Fingerprint of the desired content; unknown if it cannot be computed yet.
    pub desired_hash: &'a Knowable<ContentHash>,
}

/// Run the state machine. On error nothing is predicted.
pub fn plan_transition(input: TransitionInput<'_>) -> Result<TransitionOutcome> {
    let transition = Transition::select(input.previous_draft, input.desired_draft);
    obs::emit_transition_selected(
        transition.as_str(),
        input.previous_draft,
        input.desired_draft,
    );

    let latest = input.history.latest();
    let mut versions = input.history.planned();
    let unchanged_release = Knowable::Known(input.previous_release.cloned());

    let version_latest_release = match transition {
        Transition::CreateDraft => {
            versions.push(PlannedVersion {
                uuid: Knowable::Unknown,
                number: Knowable::Known(input.history.next_number()),
                state: Knowable::Known(VersionState::Draft),
                content_hash: input.desired_hash.clone(),
            });
            unchanged_release
        }
        Transition::UpdateDraft => {
            if let Some(last) = versions.last_mut() {
                last.content_hash = input.desired_hash.clone();
            }
            unchanged_release
        }
        Transition::Release => {
            // Approval may be required, so the resulting state is only known after apply.
            if let Some(last) = versions.last_mut() {
                last.state = Knowable::Unknown;
                last.content_hash = input.desired_hash.clone();
            }
            Knowable::Unknown
        }
        Transition::Unchanged => {
            match input.desired_hash {
                Knowable::Known(desired) if *desired == latest.content_hash => {}
                Knowable::Known(desired) => {
                    return Err(BlockDefError::ImmutableVersionModified {
                        number: latest.number,
                        state: latest.state,
                        stored: latest.content_hash.to_string(),
                        desired: desired.to_string(),
                    });
                }
                Knowable::Unknown => {
                    if let Some(last) = versions.last_mut() {
                        last.content_hash = Knowable::Unknown;
                    }
                }
            }
            unchanged_release
        }
    };

    Ok(TransitionOutcome {
        transition,
        versions,
        version_latest_release,
    })
}
