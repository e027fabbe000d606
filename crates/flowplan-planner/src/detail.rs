//! Build result: the plan plus an index from original graph elements to the
//! stages and stage ports they ended up in.

use std::collections::BTreeMap;

use flowplan_core::graph::OperatorGraph;
use flowplan_core::id::{OperatorId, PortId, StageId, StagePortId};

use crate::plan::Plan;

#[derive(Debug)]
pub struct PlanDetail {
    plan: Plan,
    stages_by_operator: BTreeMap<OperatorId, Vec<StageId>>,
    ports_by_port: BTreeMap<PortId, Vec<StagePortId>>,
}

impl PlanDetail {
    /// Indexes a finished plan. Called once by `PlanBuilder::build`.
    pub(crate) fn index(graph: &OperatorGraph, plan: Plan) -> Self {
        let mut stages_by_operator: BTreeMap<OperatorId, Vec<StageId>> = BTreeMap::new();
        for stage in plan.elements() {
            for op in stage.body() {
                stages_by_operator.entry(*op).or_default().push(stage.id());
            }
        }
        // a shared marker resolves first to the stage that produces it
        for (op, owners) in stages_by_operator.iter_mut() {
            owners.sort_by_key(|s| {
                let is_tail = plan
                    .stage(*s)
                    .map(|st| st.tails().contains(op))
                    .unwrap_or(false);
                (!is_tail, *s)
            });
        }

        let ports_by_port = index_ports(graph, &plan);
        Self {
            plan,
            stages_by_operator,
            ports_by_port,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Hands the plan to post-build rewiring passes.
    pub fn into_plan(self) -> Plan {
        self.plan
    }

    /// Owning stage of a body operator. For a marker shared by several stages
    /// this is the stage where it is a tail, else the first stage using it as
    /// a head.
    pub fn resolve_stage(&self, operator: OperatorId) -> Option<StageId> {
        self.resolve_stages(operator).first().copied()
    }

    pub fn resolve_stages(&self, operator: OperatorId) -> &[StageId] {
        self.stages_by_operator
            .get(&operator)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stage port for a port of a boundary marker.
    ///
    /// The input port of a tail resolves to the producing stage's output and
    /// the output port of a head to the consuming stage's input; the
    /// remaining marker ports fall back to the boundary they belong to.
    pub fn resolve_port(&self, port: PortId) -> Option<StagePortId> {
        self.resolve_ports(port).first().copied()
    }

    pub fn resolve_ports(&self, port: PortId) -> &[StagePortId] {
        self.ports_by_port
            .get(&port)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Original marker a stage port was created for.
    pub fn source_of(&self, port: StagePortId) -> Option<OperatorId> {
        self.plan.port(port).map(|p| p.marker())
    }

    /// Operators that ended up in at least one stage.
    pub fn operators(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.stages_by_operator.keys().copied()
    }
}

fn index_ports(graph: &OperatorGraph, plan: &Plan) -> BTreeMap<PortId, Vec<StagePortId>> {
    let mut primary: BTreeMap<PortId, Vec<StagePortId>> = BTreeMap::new();
    let mut fallback: Vec<(PortId, StagePortId)> = Vec::new();
    for stage in plan.elements() {
        for (head, input) in stage.heads().iter().zip(stage.inputs()) {
            if let Some(op) = graph.operator(*head) {
                for p in op.outputs() {
                    primary.entry(*p).or_default().push(*input);
                }
                fallback.extend(op.inputs().iter().map(|p| (*p, *input)));
            }
        }
        for (tail, output) in stage.tails().iter().zip(stage.outputs()) {
            if let Some(op) = graph.operator(*tail) {
                for p in op.inputs() {
                    primary.entry(*p).or_default().push(*output);
                }
                fallback.extend(op.outputs().iter().map(|p| (*p, *output)));
            }
        }
    }
    for (port, stage_port) in fallback {
        primary.entry(port).or_default().push(stage_port);
    }
    primary
}
