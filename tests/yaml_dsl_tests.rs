//! YAML graph loading, planning and snapshots end to end.

use flowplan::flowplan_planner::dsl::DslError;
use flowplan::{
    parse_yaml_graph, DiagnosticKind, MarkerKind, PlanError, PlanSnapshot, PlannerConfig,
};

const PIPELINE: &str = r#"
operators:
  - { name: source, marker: begin }
  - { name: parse }
  - { name: shuffle, marker: checkpoint }
  - { name: aggregate }
  - { name: sink, marker: end }
edges:
  - [source, parse]
  - [parse, shuffle]
  - [shuffle, aggregate]
  - [aggregate, sink]
stages:
  - { heads: [source], tails: [shuffle], label: map }
  - { heads: [shuffle], tails: [sink], label: reduce }
"#;

#[test]
fn pipeline_builds_two_linked_stages() {
    let parsed = parse_yaml_graph(PIPELINE).unwrap();
    let config = parsed.effective_config(PlannerConfig::default());
    let detail = parsed.build_plan(&config).unwrap();

    let snap = PlanSnapshot::from_detail(&parsed.graph, &detail);
    assert_eq!(snap.stages.len(), 2);
    assert_eq!(snap.stages[0].label.as_deref(), Some("map"));
    assert_eq!(snap.stages[1].label.as_deref(), Some("reduce"));
    assert_eq!(snap.stages[0].tails, vec!["shuffle"]);
    assert_eq!(snap.stages[1].heads, vec!["shuffle"]);
    assert_eq!(snap.edges.len(), 1);
    assert!(snap.ports.iter().all(|p| p.kind.is_some()));
    assert_eq!(snap.ports[0].kind, Some(MarkerKind::Begin));

    let aggregate = parsed.graph.find("aggregate").unwrap();
    assert_eq!(detail.resolve_stage(aggregate), Some(snap.stages[1].id));
}

#[test]
fn snapshot_json_is_stable() {
    let parsed = parse_yaml_graph(PIPELINE).unwrap();
    let first = parsed.build_plan(&PlannerConfig::default()).unwrap();
    let second = parsed.build_plan(&PlannerConfig::default()).unwrap();

    let a = PlanSnapshot::from_detail(&parsed.graph, &first);
    let b = PlanSnapshot::from_detail(&parsed.graph, &second);
    assert_eq!(a.to_json_pretty().unwrap(), b.to_json_pretty().unwrap());
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

    let value: serde_json::Value = serde_json::from_str(&a.to_json_pretty().unwrap()).unwrap();
    assert_eq!(value["stages"].as_array().unwrap().len(), 2);
    assert_eq!(value["ports"][1]["direction"], "output");
    assert_eq!(value["ports"][1]["kind"], "checkpoint");
    assert_eq!(value["edges"][0]["upstream"], 1);
    assert_eq!(value["edges"][0]["downstream"], 2);
}

#[test]
fn structural_errors_surface_with_stage_index() {
    let src = r#"
operators:
  - { name: begin, marker: begin }
  - { name: a }
  - { name: x }
  - { name: end, marker: end }
edges:
  - [begin, a]
  - [x, a]
  - [a, end]
stages:
  - { heads: [begin], tails: [end] }
"#;
    let parsed = parse_yaml_graph(src).unwrap();
    let err = parsed.build_plan(&PlannerConfig::default()).unwrap_err();
    match err {
        DslError::Stage { index, source } => {
            assert_eq!(index, 0);
            assert_eq!(source.kind(), DiagnosticKind::OrphanedUpstreamOperator);
            assert_eq!(source.operator(), parsed.graph.find("a"));
        }
        other => panic!("expected a stage error, got {other}"),
    }
}

#[test]
fn cycles_between_stages_respect_config() {
    // s1 feeds s2 through cp1, s2 feeds s1 back through cp2
    let src = r#"
operators:
  - { name: begin, marker: begin }
  - { name: a, inputs: [main, loop] }
  - { name: cp1, marker: checkpoint }
  - { name: b }
  - { name: cp2, marker: checkpoint }
  - { name: relay, marker: checkpoint }
edges:
  - [begin, a.main]
  - [a, cp1]
  - [cp1, b]
  - [b, cp2]
  - [cp2, relay]
  - [relay, a.loop]
stages:
  - { heads: [begin, relay], tails: [cp1] }
  - { heads: [cp1], tails: [cp2] }
"#;
    let parsed = parse_yaml_graph(src).unwrap();
    let strict = parsed.build_plan(&PlannerConfig::default()).unwrap_err();
    assert!(matches!(
        strict,
        DslError::Plan(PlanError::CyclicPlan { .. })
    ));

    let relaxed = PlannerConfig {
        verify_acyclic: false,
        ..Default::default()
    };
    let detail = parsed.build_plan(&relaxed).unwrap();
    assert!(detail.plan().sorted_stages().is_err());
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let err = parse_yaml_graph("operators: [ { name: a").unwrap_err();
    assert!(matches!(err, DslError::Yaml(_)));

    let err = parse_yaml_graph("operators:\n  - { name: m, marker: sideways }\n").unwrap_err();
    assert!(matches!(err, DslError::Yaml(_)));
}
