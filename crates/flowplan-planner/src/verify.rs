//! Debug-time verification helpers for plans.
//!
//! The `assert_*` functions panic with a descriptive message and are meant for
//! tests and debug builds. `check_acyclic` is the non-panicking variant used by
//! `PlanBuilder::build`.

use flowplan_core::graph::OperatorGraph;
use flowplan_core::marker::OperatorKind;

use crate::error::Result;
use crate::plan::Plan;

/// Fails with `CyclicPlan` when the stage graph has a cycle.
pub fn check_acyclic(plan: &Plan) -> Result<()> {
    plan.sorted_stages().map(|_| ())
}

/// Every opposite link is present on both ends and joins an output to an
/// input on a different stage.
pub fn assert_symmetric(plan: &Plan) {
    for port in plan.ports() {
        for other in port.opposites() {
            let opposite = plan
                .port(*other)
                .unwrap_or_else(|| panic!("{} links to unknown port {other}", port.id()));
            assert!(
                opposite.opposites().contains(&port.id()),
                "link {} -> {other} is not mirrored",
                port.id()
            );
            assert_ne!(
                port.owner(),
                opposite.owner(),
                "{} and {other} belong to the same stage",
                port.id()
            );
            assert_ne!(
                port.direction(),
                opposite.direction(),
                "{} and {other} have the same direction",
                port.id()
            );
        }
    }
}

pub fn assert_acyclic(plan: &Plan) {
    if let Err(e) = check_acyclic(plan) {
        panic!("{e}");
    }
}

/// No ordinary operator sits in more than one stage body, and a marker is
/// shared only when it is a boundary of every stage holding it.
pub fn assert_disjoint_bodies(plan: &Plan, graph: &OperatorGraph) {
    for op in graph.operators() {
        let owners: Vec<_> = plan.elements().filter(|s| s.contains(op.id())).collect();
        if owners.len() < 2 {
            continue;
        }
        assert!(
            op.kind() != OperatorKind::Ordinary,
            "operator {} ({}) is in {} stages",
            op.id(),
            op.name(),
            owners.len()
        );
        for stage in owners {
            assert!(
                stage.is_boundary(op.id()),
                "shared marker {} ({}) is interior to {}",
                op.id(),
                op.name(),
                stage.id()
            );
        }
    }
}
