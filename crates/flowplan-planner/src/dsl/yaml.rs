//! YAML -> `OperatorGraph` loader with stage declarations.
//!
//! Example:
//! ```yaml
//! config: { verify_acyclic: true }
//! operators:
//!   - { name: begin, marker: begin }
//!   - { name: a }
//!   - { name: join, inputs: [left, right] }
//!   - { name: end, marker: end }
//! edges:
//!   - [begin, a]
//!   - [a, join.left]
//!   - [join, end]
//! stages:
//!   - { heads: [begin], tails: [end], label: main }
//! ```
//!
//! Edge endpoints are `operator` or `operator.port`. A bare name uses the
//! operator's first port in that direction, creating `in`/`out` when the
//! operator has none.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use flowplan_core::attr::Attributed;
use flowplan_core::config::PlannerConfig;
use flowplan_core::graph::{OperatorGraph, PortDirection, DEFAULT_INPUT, DEFAULT_OUTPUT};
use flowplan_core::id::{OperatorId, PortId};
use flowplan_core::marker::MarkerKind;

use super::DslError;
use crate::builder::PlanBuilder;
use crate::detail::PlanDetail;
use crate::inspect::StageLabel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDoc {
    #[serde(default)]
    pub config: Option<PlanConfigDoc>,
    pub operators: Vec<OperatorDef>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
    #[serde(default)]
    pub stages: Vec<StageDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorDef {
    pub name: String,
    #[serde(default)]
    pub marker: Option<MarkerKind>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub heads: Vec<String>,
    pub tails: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Planner overrides carried by a document. Unset fields keep the value
/// coming from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfigDoc {
    pub enforce_disjoint_bodies: Option<bool>,
    pub verify_acyclic: Option<bool>,
    pub connect_through_markers: Option<bool>,
    pub max_stages: Option<usize>,
}

impl PlanConfigDoc {
    pub fn apply(&self, cfg: &mut PlannerConfig) {
        if let Some(v) = self.enforce_disjoint_bodies {
            cfg.enforce_disjoint_bodies = v;
        }
        if let Some(v) = self.verify_acyclic {
            cfg.verify_acyclic = v;
        }
        if let Some(v) = self.connect_through_markers {
            cfg.connect_through_markers = v;
        }
        if let Some(v) = self.max_stages {
            cfg.max_stages = Some(v);
        }
    }
}

/// A stage declaration resolved against the loaded graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDecl {
    pub heads: Vec<OperatorId>,
    pub tails: Vec<OperatorId>,
    pub label: Option<String>,
}

#[derive(Debug)]
pub struct ParsedGraph {
    pub graph: OperatorGraph,
    pub stages: Vec<StageDecl>,
    pub config: PlanConfigDoc,
}

impl ParsedGraph {
    /// `base` with the document's overrides applied.
    pub fn effective_config(&self, base: PlannerConfig) -> PlannerConfig {
        let mut cfg = base;
        self.config.apply(&mut cfg);
        cfg
    }

    /// Runs the builder over every declared stage, in document order.
    pub fn build_plan(&self, config: &PlannerConfig) -> Result<PlanDetail, DslError> {
        let mut builder = PlanBuilder::with_config(&self.graph, config.clone());
        for (index, decl) in self.stages.iter().enumerate() {
            let stage = builder
                .add_element(decl.heads.iter().copied(), decl.tails.iter().copied())
                .map_err(|source| DslError::Stage { index, source })?;
            if let (Some(label), Some(s)) = (&decl.label, builder.stage_mut(stage)) {
                s.put_attribute(StageLabel(label.clone()));
            }
        }
        Ok(builder.build()?)
    }
}

pub fn parse_yaml_graph(yaml_src: &str) -> Result<ParsedGraph, DslError> {
    let doc: GraphDoc = serde_yaml::from_str(yaml_src)?;

    let mut graph = OperatorGraph::new();
    let mut names: HashMap<String, OperatorId> = HashMap::new();
    for def in &doc.operators {
        if names.contains_key(&def.name) {
            return Err(DslError::DuplicateOperator(def.name.clone()));
        }
        let id = match def.marker {
            Some(kind) => {
                if !def.inputs.is_empty() || !def.outputs.is_empty() {
                    return Err(DslError::MarkerPorts(def.name.clone()));
                }
                graph.add_marker(def.name.clone(), kind)
            }
            None => {
                let id = graph.add_operator(def.name.clone());
                for p in &def.inputs {
                    graph.add_input(id, p.clone())?;
                }
                for p in &def.outputs {
                    graph.add_output(id, p.clone())?;
                }
                id
            }
        };
        names.insert(def.name.clone(), id);
    }

    for (from, to) in &doc.edges {
        let (from_op, from_port) = endpoint(&names, from)?;
        let (to_op, to_port) = endpoint(&names, to)?;
        match (from_port, to_port) {
            (None, None) => graph.connect_operators(from_op, to_op)?,
            (up, down) => {
                let up = resolve(&mut graph, from_op, PortDirection::Output, up)?;
                let down = resolve(&mut graph, to_op, PortDirection::Input, down)?;
                graph.connect(up, down)?;
            }
        }
    }

    let lookup = |list: &[String]| -> Result<Vec<OperatorId>, DslError> {
        list.iter()
            .map(|n| {
                names
                    .get(n)
                    .copied()
                    .ok_or_else(|| DslError::UnknownOperator(n.clone()))
            })
            .collect()
    };
    let stages = doc
        .stages
        .iter()
        .map(|s| {
            Ok(StageDecl {
                heads: lookup(&s.heads)?,
                tails: lookup(&s.tails)?,
                label: s.label.clone(),
            })
        })
        .collect::<Result<Vec<_>, DslError>>()?;

    Ok(ParsedGraph {
        graph,
        stages,
        config: doc.config.unwrap_or_default(),
    })
}

fn endpoint<'a>(
    names: &HashMap<String, OperatorId>,
    raw: &'a str,
) -> Result<(OperatorId, Option<&'a str>), DslError> {
    let (op, port) = match raw.split_once('.') {
        Some((op, port)) if !op.is_empty() && !port.is_empty() => (op, Some(port)),
        Some(_) => return Err(DslError::InvalidEndpoint(raw.to_string())),
        None => (raw, None),
    };
    let id = names
        .get(op)
        .copied()
        .ok_or_else(|| DslError::UnknownOperator(op.to_string()))?;
    Ok((id, port))
}

/// Named port lookup, or the operator's first port in `direction`.
fn resolve(
    graph: &mut OperatorGraph,
    operator: OperatorId,
    direction: PortDirection,
    name: Option<&str>,
) -> Result<PortId, DslError> {
    if let Some(name) = name {
        return Ok(graph.find_port(operator, direction, name)?);
    }
    let existing = graph.operator(operator).and_then(|op| match direction {
        PortDirection::Input => op.inputs().first().copied(),
        PortDirection::Output => op.outputs().first().copied(),
    });
    match existing {
        Some(p) => Ok(p),
        None => Ok(match direction {
            PortDirection::Input => graph.add_input(operator, DEFAULT_INPUT)?,
            PortDirection::Output => graph.add_output(operator, DEFAULT_OUTPUT)?,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;

    const CHAIN: &str = r#"
operators:
  - { name: begin, marker: begin }
  - { name: a }
  - { name: cp, marker: checkpoint }
  - { name: b }
  - { name: end, marker: end }
edges:
  - [begin, a]
  - [a, cp]
  - [cp, b]
  - [b, end]
stages:
  - { heads: [begin], tails: [cp], label: extract }
  - { heads: [cp], tails: [end] }
"#;

    #[test]
    fn parses_and_builds_checkpoint_chain() {
        let parsed = parse_yaml_graph(CHAIN).unwrap();
        assert_eq!(parsed.graph.len(), 5);
        assert_eq!(parsed.stages.len(), 2);
        assert_eq!(parsed.config, PlanConfigDoc::default());

        let detail = parsed.build_plan(&PlannerConfig::default()).unwrap();
        let plan = detail.plan();
        assert_eq!(plan.len(), 2);
        let first = plan.elements().next().unwrap();
        assert_eq!(
            first.attribute::<StageLabel>(),
            Some(&StageLabel("extract".into()))
        );
        assert_eq!(plan.ports().filter(|p| !p.opposites().is_empty()).count(), 2);
    }

    #[test]
    fn explicit_ports_are_resolved() {
        let src = r#"
operators:
  - { name: l, marker: begin }
  - { name: r, marker: begin }
  - { name: join, inputs: [left, right], outputs: [joined] }
  - { name: end, marker: end }
edges:
  - [l, join.left]
  - [r, join.right]
  - [join.joined, end]
stages:
  - { heads: [l, r], tails: [end] }
"#;
        let parsed = parse_yaml_graph(src).unwrap();
        let join = parsed.graph.find("join").unwrap();
        assert_eq!(parsed.graph.operator(join).unwrap().inputs().len(), 2);
        assert_eq!(parsed.graph.predecessors(join).len(), 2);
        let detail = parsed.build_plan(&PlannerConfig::default()).unwrap();
        assert_eq!(detail.plan().len(), 1);
    }

    #[test]
    fn config_block_overrides_base() {
        let src = r#"
config: { verify_acyclic: false, max_stages: 3 }
operators:
  - { name: a }
"#;
        let parsed = parse_yaml_graph(src).unwrap();
        let cfg = parsed.effective_config(PlannerConfig::default());
        assert!(!cfg.verify_acyclic);
        assert_eq!(cfg.max_stages, Some(3));
        assert!(cfg.enforce_disjoint_bodies);
    }

    #[test]
    fn name_errors() {
        let dup = "operators:\n  - { name: a }\n  - { name: a }\n";
        assert!(matches!(
            parse_yaml_graph(dup),
            Err(DslError::DuplicateOperator(n)) if n == "a"
        ));

        let missing = "operators:\n  - { name: a }\nedges:\n  - [a, ghost]\n";
        assert!(matches!(
            parse_yaml_graph(missing),
            Err(DslError::UnknownOperator(n)) if n == "ghost"
        ));

        let bad_port = "operators:\n  - { name: a }\n  - { name: b }\nedges:\n  - [a., b]\n";
        assert!(matches!(
            parse_yaml_graph(bad_port),
            Err(DslError::InvalidEndpoint(_))
        ));

        let marker_ports = "operators:\n  - { name: m, marker: end, inputs: [x] }\n";
        assert!(matches!(
            parse_yaml_graph(marker_ports),
            Err(DslError::MarkerPorts(_))
        ));

        let undeclared = "operators:\n  - { name: a }\n  - { name: b, inputs: [x] }\nedges:\n  - [a, b.y]\n";
        assert!(matches!(
            parse_yaml_graph(undeclared),
            Err(DslError::Graph(flowplan_core::Error::NoSuchPort { .. }))
        ));
    }

    #[test]
    fn stage_failures_carry_their_index() {
        let src = r#"
operators:
  - { name: begin, marker: begin }
  - { name: a }
  - { name: end, marker: end }
edges:
  - [begin, a]
  - [a, end]
stages:
  - { heads: [a], tails: [end] }
"#;
        let parsed = parse_yaml_graph(src).unwrap();
        let err = parsed.build_plan(&PlannerConfig::default()).unwrap_err();
        match err {
            DslError::Stage { index, source } => {
                assert_eq!(index, 0);
                assert!(matches!(source, PlanError::NotAPlanMarker { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
