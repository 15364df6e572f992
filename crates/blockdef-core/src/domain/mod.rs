//! Domain models for blockdef.
//!
//! - `DefinitionState` / `DesiredDefinition`: prior and desired definition
//! - `VersionRecord` / `PlannedVersion`: persisted and predicted versions
//! - `payload`: control-field and secret handling on opaque payloads

pub mod definition;
pub mod error;
pub mod payload;
pub mod version;

pub use definition::{DefinitionState, DesiredDefinition};
pub use error::{BlockDefError, Result};
pub use version::{PlannedVersion, VersionRecord, VersionState};
