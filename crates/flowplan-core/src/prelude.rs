//! Convenient re-exports for downstream crates.

pub use crate::attr::{AttributeMap, Attributed};
pub use crate::config::PlannerConfig;
pub use crate::error::{Error, Result};
pub use crate::fingerprint::Fingerprint;
pub use crate::graph::{Operator, OperatorGraph, OperatorPort, PortDirection};
pub use crate::id::{GraphId, OperatorId, PortId, StageId, StagePortId};
pub use crate::marker::{BoundaryRole, MarkerKind, OperatorKind};
