//! Apply-time orchestration against a [`VersionClient`].
//!
//! The applier runs one lifecycle step per call, then reads the history back
//! from the backend and reconciles it. Calls for one definition are issued
//! sequentially and never retried.

use blockdef_client::{ClientError, VersionClient, VersionDto};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::PredictorConfig;
use crate::diagnostics::Diagnostics;
use crate::domain::definition::{DefinitionState, DesiredDefinition};
use crate::domain::error::{BlockDefError, Result};
use crate::domain::payload::{hashable_payload, upstream_payload};
use crate::domain::version::{VersionRecord, VersionState};
use crate::fingerprint::{ContentHash, Fingerprinter};
use crate::history::{reconcile, Reconciliation};
use crate::knowable::Knowable;
use crate::lifecycle::Transition;
use crate::obs;
use crate::predictor::{check_released_secrets, PredictedState};

/// New state after a successful operation, plus any warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub state: DefinitionState,
    pub diagnostics: Diagnostics,
}

/// Desired values resolved at apply time, when nothing may be unknown.
struct ResolvedDesired {
    draft: bool,
    content: Value,
    hash: ContentHash,
}

pub struct DefinitionApplier<C: VersionClient> {
    client: C,
    config: PredictorConfig,
    fingerprinter: Fingerprinter,
}

impl<C: VersionClient> DefinitionApplier<C> {
    pub fn new(client: C, config: PredictorConfig) -> Self {
        let fingerprinter = Fingerprinter::new(config.fingerprint.clone());
        Self {
            client,
            config,
            fingerprinter,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Write the first version of a freshly created definition.
    ///
    /// The backend seeds every new definition with draft version 1; its
    /// content is replaced with the desired one, requesting release when
    /// the draft flag is `false`.
    pub async fn create(
        &self,
        definition_id: Uuid,
        workspace: &str,
        desired: &DesiredDefinition,
    ) -> Result<Applied> {
        let span = obs::definition_span(&definition_id, "create");
        async move {
            let resolved = self.resolve(desired)?;
            let records = self.list(definition_id).await?;
            let seed = records
                .iter()
                .max_by_key(|v| v.number)
                .ok_or(BlockDefError::NoVersionsFound { definition_id })?;

            let state = requested_state(resolved.draft);
            self.update(
                definition_id,
                seed.uuid,
                workspace,
                &upstream_payload(&resolved.content, state, definition_id),
            )
            .await?;

            let reconciliation = self
                .read_back(definition_id, Knowable::Known(resolved.draft), None)
                .await?;
            verify_hash(&reconciliation, &resolved.hash)?;
            Ok(self.finish(definition_id, workspace, desired, resolved.draft, reconciliation))
        }
        .instrument(span)
        .await
    }

    /// Run the lifecycle step from `prior` to `desired`.
    ///
    /// The transition is chosen again from the now fully known draft flag.
    /// A released version that stays released is only accepted when neither
    /// its content hash nor its secrets change; otherwise nothing is written
    /// and the prior state stands.
    /// After the backend has answered, the planned latest content hash (or
    /// the desired one when the plan could not know it) must match the
    /// authoritative hash.
    pub async fn apply(
        &self,
        prior: &DefinitionState,
        planned: &PredictedState,
        desired: &DesiredDefinition,
    ) -> Result<Applied> {
        let definition_id = prior.uuid;
        let span = obs::definition_span(&definition_id, "apply");
        async move {
            let resolved = self.resolve(desired)?;
            let transition = Transition::select(prior.draft, resolved.draft);
            obs::emit_transition_selected(transition.as_str(), prior.draft, resolved.draft);
            let latest = prior.version_latest();

            match transition {
                Transition::CreateDraft => {
                    let payload =
                        upstream_payload(&resolved.content, VersionState::Draft, definition_id);
                    self.create_version(definition_id, &payload).await?;
                }
                Transition::UpdateDraft | Transition::Release => {
                    let payload = upstream_payload(
                        &resolved.content,
                        requested_state(resolved.draft),
                        definition_id,
                    );
                    self.update(definition_id, latest.uuid, &prior.workspace, &payload)
                        .await?;
                }
                Transition::Unchanged => {
                    check_released_secrets(prior, desired, &self.config)?;
                    if resolved.hash != latest.content_hash {
                        return Err(BlockDefError::ImmutableVersionModified {
                            number: latest.number,
                            state: latest.state,
                            stored: latest.content_hash.to_string(),
                            desired: resolved.hash.to_string(),
                        });
                    }
                }
            }

            let reconciliation = self
                .read_back(
                    definition_id,
                    Knowable::Known(resolved.draft),
                    prior.version_latest_release.as_ref(),
                )
                .await?;
            let expected = planned
                .version_latest
                .content_hash
                .known()
                .unwrap_or(&resolved.hash);
            verify_hash(&reconciliation, expected)?;
            Ok(self.finish(
                definition_id,
                &prior.workspace,
                desired,
                resolved.draft,
                reconciliation,
            ))
        }
        .instrument(span)
        .await
    }

    /// Re-read the authoritative history; the stored spec is kept.
    pub async fn refresh(&self, prior: &DefinitionState) -> Result<Applied> {
        let definition_id = prior.uuid;
        let span = obs::definition_span(&definition_id, "refresh");
        async move {
            let reconciliation = self
                .read_back(
                    definition_id,
                    Knowable::Known(prior.draft),
                    prior.version_latest_release.as_ref(),
                )
                .await?;
            Ok(Applied {
                state: DefinitionState {
                    versions: reconciliation.history,
                    version_latest_release: reconciliation.version_latest_release,
                    ..prior.clone()
                },
                diagnostics: reconciliation.diagnostics,
            })
        }
        .instrument(span)
        .await
    }

    fn resolve(&self, desired: &DesiredDefinition) -> Result<ResolvedDesired> {
        let draft = desired.draft(&self.config)?.into_known().ok_or_else(|| {
            BlockDefError::InvalidDesiredState(format!(
                "'{}' is still unknown at apply time",
                self.config.draft_key
            ))
        })?;
        let content = desired
            .content(&self.config)
            .to_json()
            .ok_or_else(|| {
                BlockDefError::InvalidDesiredState(
                    "version spec still has unknown values at apply time".to_string(),
                )
            })?;
        let hash = self
            .fingerprinter
            .fingerprint_value(&hashable_payload(&content, &self.config))?;
        Ok(ResolvedDesired {
            draft,
            content,
            hash,
        })
    }

    async fn read_back(
        &self,
        definition_id: Uuid,
        desired_draft: Knowable<bool>,
        previous_release: Option<&VersionRecord>,
    ) -> Result<Reconciliation> {
        let records = self.list(definition_id).await?;
        reconcile(
            definition_id,
            records,
            desired_draft,
            previous_release,
            &self.config,
        )
    }

    async fn list(&self, definition_id: Uuid) -> Result<Vec<VersionDto>> {
        obs::emit_upstream_call("list_versions", &definition_id);
        self.client
            .list_versions(definition_id)
            .await
            .map_err(upstream("list_versions", definition_id, None))
    }

    async fn create_version(&self, definition_id: Uuid, payload: &Value) -> Result<VersionDto> {
        obs::emit_upstream_call("create_version", &definition_id);
        self.client
            .create_version(definition_id, payload)
            .await
            .map_err(upstream("create_version", definition_id, None))
    }

    async fn update(
        &self,
        definition_id: Uuid,
        version_id: Uuid,
        workspace: &str,
        payload: &Value,
    ) -> Result<VersionDto> {
        obs::emit_upstream_call("update_version", &version_id);
        self.client
            .update_version(version_id, workspace, payload)
            .await
            .map_err(upstream("update_version", definition_id, Some(version_id)))
    }

    fn finish(
        &self,
        definition_id: Uuid,
        workspace: &str,
        desired: &DesiredDefinition,
        draft: bool,
        reconciliation: Reconciliation,
    ) -> Applied {
        Applied {
            state: DefinitionState {
                uuid: definition_id,
                workspace: workspace.to_string(),
                draft,
                version_spec: desired.content(&self.config),
                versions: reconciliation.history,
                version_latest_release: reconciliation.version_latest_release,
            },
            diagnostics: reconciliation.diagnostics,
        }
    }
}

fn requested_state(draft: bool) -> VersionState {
    if draft {
        VersionState::Draft
    } else {
        VersionState::Released
    }
}

fn upstream(
    operation: &'static str,
    definition_id: Uuid,
    version_id: Option<Uuid>,
) -> impl FnOnce(ClientError) -> BlockDefError {
    move |source| {
        obs::emit_upstream_error(operation, &source);
        BlockDefError::Upstream {
            operation,
            definition_id,
            version_id,
            source,
        }
    }
}

fn verify_hash(reconciliation: &Reconciliation, expected: &ContentHash) -> Result<()> {
    let latest = reconciliation.version_latest();
    if latest.content_hash != *expected {
        return Err(BlockDefError::ContentHashInconsistency {
            number: latest.number,
            planned: expected.to_string(),
            actual: latest.content_hash.to_string(),
        });
    }
    Ok(())
}
