//! Plan-time prediction of a definition's version history.
//!
//! [`PlanPredictor::predict`] is a pure function of its configuration, the
//! prior state and the desired configuration. It performs no I/O and holds
//! no mutable state, so one predictor can serve many resource instances on
//! many threads.
//!
//! Unknown handling:
//! - unknown draft flag: the latest version is predicted wholly unknown
//!   (content hash excepted, when computable) and a warning is emitted
//! - unknown content anywhere: the predicted content hash is unknown
//! - pending secret rotation: the predicted content hash is unknown even
//!   when everything else is known, because secret references are not part
//!   of the fingerprint; on a released version that stays released the
//!   rotation is an error

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PredictorConfig;
use crate::config_value::ConfigValue;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::domain::definition::{DefinitionState, DesiredDefinition};
use crate::domain::error::{BlockDefError, Result};
use crate::domain::payload::{hashable_payload, secret_rotations};
use crate::domain::version::{PlannedVersion, VersionRecord, VersionState};
use crate::fingerprint::{ContentHash, Fingerprinter};
use crate::knowable::Knowable;
use crate::lifecycle::{plan_transition, Transition, TransitionInput};
use crate::obs;

/// Predicted post-apply state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedState {
    /// Lifecycle transition; `None` on creation or when the draft flag is unknown.
    pub transition: Option<Transition>,
    pub versions: Vec<PlannedVersion>,
    pub version_latest: PlannedVersion,
    pub version_latest_release: Knowable<Option<VersionRecord>>,
    /// Fingerprint of the desired content.
    pub desired_hash: Knowable<ContentHash>,
}

/// Outcome of a plan: a predicted state unless an error was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub state: Option<PredictedState>,
    pub diagnostics: Diagnostics,
}

impl Prediction {
    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanPredictor {
    config: PredictorConfig,
    fingerprinter: Fingerprinter,
}

impl PlanPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        let fingerprinter = Fingerprinter::new(config.fingerprint.clone());
        Self {
            config,
            fingerprinter,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Predict the history after applying `desired` on top of `prior`.
    ///
    /// Problems in the draft flag and in the content are reported together.
    pub fn predict(&self, prior: &DefinitionState, desired: &DesiredDefinition) -> Prediction {
        let _span = obs::DefinitionSpan::enter(&prior.uuid, "plan");
        let mut diagnostics = Diagnostics::new();

        let Some((desired_draft, desired_hash)) =
            self.desired_inputs(Some(&prior.version_spec), desired, &mut diagnostics)
        else {
            return Prediction::failed(diagnostics);
        };

        let state = match desired_draft {
            Knowable::Unknown => {
                diagnostics.push(draft_unknown_warning(&self.config.draft_key));
                let mut versions = prior.versions.planned();
                versions.pop();
                let latest = PlannedVersion {
                    content_hash: desired_hash.clone(),
                    ..PlannedVersion::unknown()
                };
                versions.push(latest.clone());
                PredictedState {
                    transition: None,
                    versions,
                    version_latest: latest,
                    version_latest_release: Knowable::Unknown,
                    desired_hash,
                }
            }
            Knowable::Known(desired_draft) => {
                let outcome = plan_transition(TransitionInput {
                    history: &prior.versions,
                    previous_draft: prior.draft,
                    previous_release: prior.version_latest_release.as_ref(),
                    desired_draft,
                    desired_hash: &desired_hash,
                })
                .and_then(|outcome| {
                    if outcome.transition == Transition::Unchanged {
                        check_released_secrets(prior, desired, &self.config)?;
                    }
                    Ok(outcome)
                });
                match outcome {
                    Ok(outcome) => PredictedState {
                        transition: Some(outcome.transition),
                        version_latest: outcome.version_latest().clone(),
                        versions: outcome.versions,
                        version_latest_release: outcome.version_latest_release,
                        desired_hash,
                    },
                    Err(err) => {
                        diagnostics.push_error(&err);
                        return Prediction::failed(diagnostics);
                    }
                }
            }
        };

        self.finish(state, diagnostics)
    }

    /// Predict the history of a definition about to be created. The backend
    /// seeds version 1 as a draft; the create flow then writes its content.
    pub fn predict_create(&self, desired: &DesiredDefinition) -> Prediction {
        let mut diagnostics = Diagnostics::new();
        let Some((desired_draft, desired_hash)) =
            self.desired_inputs(None, desired, &mut diagnostics)
        else {
            return Prediction::failed(diagnostics);
        };

        if desired_draft.is_unknown() {
            diagnostics.push(draft_unknown_warning(&self.config.draft_key));
        }
        let (state, version_latest_release) = match desired_draft {
            Knowable::Known(true) => (Knowable::Known(VersionState::Draft), Knowable::Known(None)),
            _ => (Knowable::Unknown, Knowable::Unknown),
        };
        let latest = PlannedVersion {
            uuid: Knowable::Unknown,
            number: Knowable::Known(1),
            state,
            content_hash: desired_hash.clone(),
        };

        let state = PredictedState {
            transition: None,
            versions: vec![latest.clone()],
            version_latest: latest,
            version_latest_release,
            desired_hash,
        };
        self.finish(state, diagnostics)
    }

    /// Fingerprint of the desired content, or unknown when it cannot be
    /// computed faithfully yet.
    pub fn desired_fingerprint(
        &self,
        prior_spec: Option<&ConfigValue>,
        desired: &DesiredDefinition,
    ) -> Result<Knowable<ContentHash>> {
        let content = desired.content(&self.config);
        if !content.is_fully_known() {
            debug!("desired content has unknown values; content hash unknown");
            return Ok(Knowable::Unknown);
        }
        if let Some(prior_spec) = prior_spec {
            let rotations = self.pending_secret_rotations(prior_spec, &content);
            if !rotations.is_empty() {
                debug!(paths = ?rotations, "secret rotation pending; content hash unknown");
                return Ok(Knowable::Unknown);
            }
        }
        content
            .to_json()
            .map(|json| {
                self.fingerprinter
                    .fingerprint_value(&hashable_payload(&json, &self.config))
            })
            .map(Knowable::Known)
            .unwrap_or(Knowable::Unknown)
            .transpose()
    }

    /// Paths of secret nodes whose reference or plaintext will change on apply.
    pub fn pending_secret_rotations(&self, prior: &ConfigValue, desired: &ConfigValue) -> Vec<String> {
        secret_rotations(prior, desired, &self.config)
    }

    /// Draft flag and content hash, each evaluated even when the other fails.
    fn desired_inputs(
        &self,
        prior_spec: Option<&ConfigValue>,
        desired: &DesiredDefinition,
        diagnostics: &mut Diagnostics,
    ) -> Option<(Knowable<bool>, Knowable<ContentHash>)> {
        let draft = noted(desired.draft(&self.config), diagnostics);
        let hash = noted(self.desired_fingerprint(prior_spec, desired), diagnostics);
        Some((draft?, hash?))
    }

    fn finish(&self, state: PredictedState, diagnostics: Diagnostics) -> Prediction {
        obs::emit_prediction_finished(
            state.versions.len(),
            state.desired_hash.is_known(),
            diagnostics.warnings().count(),
            diagnostics.errors().count(),
        );
        Prediction {
            state: Some(state),
            diagnostics,
        }
    }
}

/// Refuse a released version whose secrets `desired` would rotate. The
/// backend cannot take the new material without a new draft.
pub(crate) fn check_released_secrets(
    prior: &DefinitionState,
    desired: &DesiredDefinition,
    config: &PredictorConfig,
) -> Result<()> {
    let paths = secret_rotations(&prior.version_spec, &desired.content(config), config);
    if paths.is_empty() {
        return Ok(());
    }
    Err(BlockDefError::SecretRotationOnReleased {
        number: prior.version_latest().number,
        paths,
    })
}

fn noted<T>(result: Result<T>, diagnostics: &mut Diagnostics) -> Option<T> {
    result.map_err(|err| diagnostics.push_error(&err)).ok()
}

fn draft_unknown_warning(draft_key: &str) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticKind::DraftFlagUnknown,
        "Draft flag unknown at plan time",
        format!(
            "'{draft_key}' depends on values only known after apply, so the resulting \
             version cannot be predicted. Make it known at plan time for an accurate plan."
        ),
    )
}
