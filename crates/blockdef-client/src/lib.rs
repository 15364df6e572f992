//! Blockdef-Client: version backend contract
//!
//! This crate defines the boundary between the versioning engine and the
//! remote system that persists building-block definitions.
//!
//! ## Key Components
//!
//! - `VersionClient`: async create/update/list contract
//! - `VersionDto`: version record as returned by the backend
//! - `VersionState`: draft / in_review / released
//! - `fakes::MemoryVersionClient`: in-memory backend for tests and simulation

pub mod client;
mod error;
pub mod fakes;

pub use client::{VersionClient, VersionDto, VersionState};
pub use error::{ClientError, ClientResult};
