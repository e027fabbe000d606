#![forbid(unsafe_code)]
//! flowplan-core: the vocabulary shared by the planner and its consumers.
//!
//! - arena-backed `OperatorGraph` (the planner's input contract)
//! - marker kinds and boundary roles
//! - type-keyed attribute bags
//! - typed handles, configuration, errors, and plan fingerprints
//!
//! No planning logic and no I/O live here.

pub mod attr;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod id;
pub mod marker;
pub mod prelude;

pub use error::{Error, Result};

/// Crate version string, stamped into plan snapshots.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
