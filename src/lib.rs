#![forbid(unsafe_code)]
//! flowplan: marker-driven partitioning of operator graphs into stage plans.
//!
//! Re-exports the core vocabulary and the planner so downstream code (and the
//! integration tests in `tests/`) can depend on a single crate.

pub use flowplan_core;
pub use flowplan_planner;

pub use flowplan_core::prelude::*;
pub use flowplan_planner::{
    parse_yaml_graph, DiagnosticKind, Plan, PlanBuilder, PlanDetail, PlanError, PlanSnapshot,
    Stage, StageLabel, StagePort,
};
