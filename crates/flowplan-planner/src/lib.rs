#![forbid(unsafe_code)]
//! flowplan-planner: operator graph -> DAG of stages.
//!
//! Design:
//! - `builder` validates one stage at a time from declared head/tail markers
//!   and, on `build()`, wires stage ports across stage boundaries.
//! - `plan` holds stages and stage ports in arenas; opposite links are kept
//!   symmetric by `Plan::connect`/`Plan::disconnect`.
//! - `detail` indexes the finished plan back to the original operators/ports.
//! - `inspect`, `verify` and `dsl` are tooling around the above.
//!
//! NOTE: bodies are frozen once a stage is accepted; later passes only rewire
//! stage ports.

pub mod builder;
pub mod detail;
pub mod dsl;
pub mod error;
pub mod inspect;
pub mod plan;
pub mod verify;

pub use builder::{Adjacency, PlanBuilder};
pub use detail::PlanDetail;
pub use dsl::{parse_yaml_graph, DslError, ParsedGraph, PlanConfigDoc};
pub use error::{DiagnosticKind, PlanError, Result};
pub use inspect::{PlanSnapshot, StageLabel};
pub use plan::{Plan, Stage, StagePort};
