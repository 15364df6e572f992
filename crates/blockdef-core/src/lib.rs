//! Blockdef Core Library
//!
//! Versioned-definition lifecycle, content fingerprinting and plan-time
//! prediction for building-block definitions.

pub mod apply;
pub mod config;
pub mod config_value;
pub mod diagnostics;
pub mod domain;
pub mod fingerprint;
pub mod history;
pub mod knowable;
pub mod lifecycle;
pub mod obs;
pub mod predictor;
pub mod telemetry;

pub use domain::{
    BlockDefError, DefinitionState, DesiredDefinition, PlannedVersion, Result, VersionRecord,
    VersionState,
};

pub use apply::{Applied, DefinitionApplier};
pub use config::{FingerprintConfig, PredictorConfig};
pub use config_value::ConfigValue;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use fingerprint::{fingerprint, ContentHash, Fingerprinter, HASH_SCHEME_V1};
pub use history::{reconcile, Reconciliation, VersionHistory};
pub use knowable::Knowable;
pub use lifecycle::{plan_transition, Transition, TransitionInput, TransitionOutcome};
pub use predictor::{PlanPredictor, PredictedState, Prediction};

pub use obs::{
    emit_pending_approval, emit_prediction_finished, emit_reconciled, emit_transition_selected,
    emit_upstream_call, DefinitionSpan,
};
pub use telemetry::{init_tracing, LogFormat};

/// Blockdef version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
