//! Structured observability hooks for definition planning and apply.
//!
//! This module provides:
//! - Definition-scoped tracing spans via `DefinitionSpan` RAII guard
//! - Emission functions for key events: transition selection, prediction,
//!   upstream calls, reconciliation, pending approval
//!
//! Events are emitted at `info!`/`debug!` level; filter with `RUST_LOG`.

use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::domain::version::VersionState;

/// Definition-scoped span for one operation.
///
/// Async callers attach it with `tracing::Instrument` instead of entering it.
pub fn definition_span(definition_id: &dyn Display, operation: &str) -> tracing::Span {
    tracing::info_span!(
        "blockdef.definition",
        definition_id = %definition_id,
        operation = %operation,
    )
}

/// RAII guard that enters a definition-scoped span for one operation.
///
/// # Example
///
/// ```ignore
/// let _span = DefinitionSpan::enter(&definition_id, "plan");
/// // every event below is tagged with definition_id and operation
/// ```
pub struct DefinitionSpan {
    _span: tracing::span::EnteredSpan,
}

impl DefinitionSpan {
    pub fn enter(definition_id: &dyn Display, operation: &str) -> Self {
        Self {
            _span: definition_span(definition_id, operation).entered(),
        }
    }
}

/// Emit event: lifecycle transition chosen for a plan.
pub fn emit_transition_selected(transition: &str, previous_draft: bool, desired_draft: bool) {
    info!(
        event = "lifecycle.transition_selected",
        transition = %transition,
        previous_draft = previous_draft,
        desired_draft = desired_draft,
    );
}

/// Emit event: prediction finished.
pub fn emit_prediction_finished(versions: usize, hash_known: bool, warnings: usize, errors: usize) {
    info!(
        event = "plan.predicted",
        versions = versions,
        hash_known = hash_known,
        warnings = warnings,
        errors = errors,
    );
}

/// Emit event: about to call the backend.
pub fn emit_upstream_call(operation: &str, target: &dyn Display) {
    debug!(event = "upstream.call", operation = %operation, target = %target);
}

/// Emit event: a backend call failed (warning level).
pub fn emit_upstream_error(operation: &str, error: &dyn Display) {
    warn!(event = "upstream.error", operation = %operation, error = %error);
}

/// Emit event: authoritative history rebuilt.
pub fn emit_reconciled(
    definition_id: &dyn Display,
    versions: usize,
    latest_number: u32,
    latest_state: VersionState,
) {
    info!(
        event = "history.reconciled",
        definition_id = %definition_id,
        versions = versions,
        latest_number = latest_number,
        latest_state = %latest_state,
    );
}

/// Emit event: release requested but still awaiting approval (warning level).
pub fn emit_pending_approval(definition_id: &dyn Display, number: u32, state: VersionState) {
    warn!(
        event = "release.pending_approval",
        definition_id = %definition_id,
        number = number,
        state = %state,
    );
}
