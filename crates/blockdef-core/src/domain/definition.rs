//! Definition state as stored by the engine and as desired by configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{BlockDefError, Result};
use super::version::VersionRecord;
use crate::config::PredictorConfig;
use crate::config_value::ConfigValue;
use crate::history::VersionHistory;
use crate::knowable::Knowable;

/// Prior state of a definition, fully known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionState {
    /// Backend identity; the engine never mints it.
    pub uuid: Uuid,
    /// Owning workspace.
    pub workspace: String,
    /// Draft flag as last applied.
    pub draft: bool,
    /// Version spec as last applied (content only, without the draft flag).
    pub version_spec: ConfigValue,
    pub versions: VersionHistory,
    pub version_latest_release: Option<VersionRecord>,
}

impl DefinitionState {
    pub fn version_latest(&self) -> &VersionRecord {
        self.versions.latest()
    }
}

/// Desired configuration for a definition's version spec.
///
/// `version_spec` is the raw desired tree, draft flag included; any leaf
/// may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredDefinition {
    pub version_spec: ConfigValue,
}

impl DesiredDefinition {
    pub fn new(version_spec: ConfigValue) -> Self {
        Self { version_spec }
    }

    /// The desired draft flag. Absent or null reads as `true`: content stays
    /// a draft until release is asked for explicitly.
    pub fn draft(&self, config: &PredictorConfig) -> Result<Knowable<bool>> {
        self.version_spec
            .knowable_bool(&config.draft_key, true)
            .ok_or_else(|| {
                BlockDefError::InvalidDesiredState(format!(
                    "'{}' must be a boolean",
                    config.draft_key
                ))
            })
    }

    /// Version content: the version spec without its draft flag.
    pub fn content(&self, config: &PredictorConfig) -> ConfigValue {
        self.version_spec.without_key(&config.draft_key)
    }
}
