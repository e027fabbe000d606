//! Serializable view of a finished plan for tooling and golden tests.

use serde::{Deserialize, Serialize};

use flowplan_core::attr::Attributed;
use flowplan_core::fingerprint::Fingerprint;
use flowplan_core::graph::{OperatorGraph, PortDirection};
use flowplan_core::id::{OperatorId, StageId, StagePortId};
use flowplan_core::marker::MarkerKind;

use crate::detail::PlanDetail;
use crate::plan::Plan;

/// Human-readable name attached to a stage (e.g. from the YAML `label:`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLabel(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub id: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub heads: Vec<String>,
    pub tails: Vec<String>,
    /// Body operator names, ascending by operator id.
    pub operators: Vec<String>,
    pub inputs: Vec<StagePortId>,
    pub outputs: Vec<StagePortId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSnapshot {
    pub id: StagePortId,
    pub stage: StageId,
    pub direction: PortDirection,
    pub marker: String,
    pub kind: Option<MarkerKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub upstream: StagePortId,
    pub downstream: StagePortId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub version: String,
    pub stages: Vec<StageSnapshot>,
    pub ports: Vec<PortSnapshot>,
    /// Output -> input links, sorted.
    pub edges: Vec<EdgeSnapshot>,
}

impl PlanSnapshot {
    pub fn from_plan(graph: &OperatorGraph, plan: &Plan) -> Self {
        let name = |op: OperatorId| {
            graph
                .operator(op)
                .map(|o| o.name().to_string())
                .unwrap_or_else(|| op.to_string())
        };

        let stages = plan
            .elements()
            .map(|s| StageSnapshot {
                id: s.id(),
                label: s.attribute::<StageLabel>().map(|l| l.0.clone()),
                heads: s.heads().iter().map(|h| name(*h)).collect(),
                tails: s.tails().iter().map(|t| name(*t)).collect(),
                operators: s.body().iter().map(|o| name(*o)).collect(),
                inputs: s.inputs().to_vec(),
                outputs: s.outputs().to_vec(),
            })
            .collect();

        let ports = plan
            .ports()
            .map(|p| PortSnapshot {
                id: p.id(),
                stage: p.owner(),
                direction: p.direction(),
                marker: name(p.marker()),
                kind: graph.kind(p.marker()).marker(),
            })
            .collect();

        let edges = plan
            .ports()
            .filter(|p| p.is_output())
            .flat_map(|p| {
                p.opposites().iter().map(move |d| EdgeSnapshot {
                    upstream: p.id(),
                    downstream: *d,
                })
            })
            .collect();

        Self {
            version: flowplan_core::VERSION.to_string(),
            stages,
            ports,
            edges,
        }
    }

    pub fn from_detail(graph: &OperatorGraph, detail: &PlanDetail) -> Self {
        Self::from_plan(graph, detail.plan())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Stable digest of the snapshot, independent of how it was built.
    pub fn fingerprint(&self) -> flowplan_core::Result<Fingerprint> {
        Fingerprint::of("flowplan/plan-snapshot", self)
    }

    /// Plain-text rendering for the `explain` command.
    pub fn explain(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "Execution Plan");
        let _ = writeln!(out, "==============");
        let _ = writeln!(out, "Stages: {}", self.stages.len());
        let _ = writeln!(out, "Links: {}", self.edges.len());
        if let Ok(fp) = self.fingerprint() {
            let _ = writeln!(out, "Fingerprint: {}", fp.short());
        }
        for stage in &self.stages {
            let _ = writeln!(out);
            match &stage.label {
                Some(label) => {
                    let _ = writeln!(out, "{} \"{}\"", stage.id, label);
                }
                None => {
                    let _ = writeln!(out, "{}", stage.id);
                }
            }
            let _ = writeln!(out, "  heads: {}", stage.heads.join(", "));
            let _ = writeln!(out, "  tails: {}", stage.tails.join(", "));
            let _ = writeln!(out, "  body:  {}", stage.operators.join(", "));
            for output in &stage.outputs {
                for edge in self.edges.iter().filter(|e| e.upstream == *output) {
                    let target = self
                        .ports
                        .iter()
                        .find(|p| p.id == edge.downstream)
                        .map(|p| p.stage.to_string())
                        .unwrap_or_else(|| edge.downstream.to_string());
                    let via = self
                        .ports
                        .iter()
                        .find(|p| p.id == *output)
                        .map(|p| p.marker.as_str())
                        .unwrap_or("?");
                    let _ = writeln!(out, "  -> {target} via {via}");
                }
            }
        }
        out
    }
}
