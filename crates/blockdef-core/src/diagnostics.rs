//! Accumulated warnings and errors.
//!
//! Operations collect every problem they find instead of stopping at the
//! first one. Any error-severity entry means the operation must not mutate
//! state further.

use serde::{Deserialize, Serialize};

use crate::domain::error::BlockDefError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    DraftFlagUnknown,
    PendingApproval,
    NoVersions,
    NoVersionsFound,
    ImmutableVersionModified,
    SecretRotationOnReleased,
    UnexpectedReleaseState,
    ContentHashInconsistency,
    DisallowedKey,
    InvalidInput,
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub summary: String,
    pub detail: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn error(kind: DiagnosticKind, summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            summary: summary.into(),
            detail: detail.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&BlockDefError> for Diagnostic {
    fn from(err: &BlockDefError) -> Self {
        let (kind, summary) = match err {
            BlockDefError::NoVersions => (DiagnosticKind::NoVersions, "Definition has no versions"),
            BlockDefError::NoVersionsFound { .. } => {
                (DiagnosticKind::NoVersionsFound, "No versions found")
            }
            BlockDefError::ImmutableVersionModified { .. } => (
                DiagnosticKind::ImmutableVersionModified,
                "Released version cannot be modified",
            ),
            BlockDefError::SecretRotationOnReleased { .. } => (
                DiagnosticKind::SecretRotationOnReleased,
                "Released version cannot rotate secrets",
            ),
            BlockDefError::UnexpectedReleaseState { .. } => (
                DiagnosticKind::UnexpectedReleaseState,
                "Unexpected release state",
            ),
            BlockDefError::ContentHashInconsistency { .. } => (
                DiagnosticKind::ContentHashInconsistency,
                "Content hash inconsistency",
            ),
            BlockDefError::DisallowedKey { .. } => {
                (DiagnosticKind::DisallowedKey, "Refusing to fingerprint payload")
            }
            BlockDefError::Upstream { .. } => (DiagnosticKind::Upstream, "Backend call failed"),
            BlockDefError::NonFiniteNumber { .. }
            | BlockDefError::InvalidContentHash(_)
            | BlockDefError::InvalidDesiredState(_)
            | BlockDefError::Serialization(_) => (DiagnosticKind::InvalidInput, "Invalid input"),
        };
        Diagnostic::error(kind, summary, err.to_string())
    }
}

impl From<BlockDefError> for Diagnostic {
    fn from(err: BlockDefError) -> Self {
        Diagnostic::from(&err)
    }
}

/// Ordered collection of diagnostics for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn push_error(&mut self, err: &BlockDefError) {
        self.items.push(Diagnostic::from(err));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    /// True if any entry has the given kind.
    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.kind == kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning(
            DiagnosticKind::PendingApproval,
            "Release pending approval",
            "version 2 is in review",
        ));
        assert!(!diags.has_errors());
        assert_eq!(diags.warnings().count(), 1);

        diags.push_error(&BlockDefError::NoVersions);
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
        assert!(diags.contains(DiagnosticKind::NoVersions));
    }

    #[test]
    fn test_error_conversion_keeps_message() {
        let diag = Diagnostic::from(BlockDefError::DisallowedKey {
            path: "a.plaintext".to_string(),
        });
        assert_eq!(diag.kind, DiagnosticKind::DisallowedKey);
        assert!(diag.detail.contains("a.plaintext"));
    }
}
