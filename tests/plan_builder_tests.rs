//! Stage partitioning against hand-built operator graphs.

use flowplan::flowplan_planner::verify;
use flowplan::{
    BoundaryRole, DiagnosticKind, MarkerKind, OperatorGraph, OperatorId, PlanBuilder, PlanError,
    PlannerConfig,
};

fn chain(graph: &mut OperatorGraph, ops: &[OperatorId]) {
    for pair in ops.windows(2) {
        graph.connect_operators(pair[0], pair[1]).unwrap();
    }
}

#[test]
fn single_stage_encloses_begin_to_end() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, a, end]);

    let mut builder = PlanBuilder::new(&g);
    let id = builder.add_element([begin], [end]).unwrap();
    let detail = builder.build().unwrap();

    let stage = detail.plan().stage(id).unwrap();
    assert_eq!(stage.inputs().len(), 1);
    assert_eq!(stage.outputs().len(), 1);
    assert_eq!(
        stage.body().iter().copied().collect::<Vec<_>>(),
        vec![begin, a, end]
    );
    assert_eq!(detail.resolve_stage(a), Some(id));
}

#[test]
fn checkpoint_links_producer_and_consumer() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let cp = g.add_marker("cp", MarkerKind::Checkpoint);
    let b = g.add_operator("b");
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, a, cp, b, end]);

    let mut builder = PlanBuilder::new(&g);
    let first = builder.add_element([begin], [cp]).unwrap();
    let second = builder.add_element([cp], [end]).unwrap();
    let detail = builder.build().unwrap();
    let plan = detail.plan();

    let produced = plan.find_output(first, cp).unwrap();
    let consumed = plan.find_input(second, cp).unwrap();
    assert!(plan.port(produced).unwrap().opposites().contains(&consumed));
    assert!(plan.port(consumed).unwrap().opposites().contains(&produced));
    assert_eq!(plan.sorted_stages().unwrap(), vec![first, second]);
    assert_eq!(
        plan.downstream_stages(first).into_iter().collect::<Vec<_>>(),
        vec![second]
    );
    verify::assert_symmetric(plan);
    verify::assert_disjoint_bodies(plan, &g);
}

#[test]
fn ordinary_head_is_not_a_plan_marker() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, a, end]);

    let mut builder = PlanBuilder::new(&g);
    let err = builder.add_element([a], [end]).unwrap_err();
    assert_eq!(
        err,
        PlanError::NotAPlanMarker {
            operator: a,
            role: BoundaryRole::Head
        }
    );
    assert_eq!(err.kind(), DiagnosticKind::NotAPlanMarker);

    // an end marker cannot open a stage either
    let err = builder.add_element([end], [end]).unwrap_err();
    assert_eq!(
        err,
        PlanError::NotAPlanMarker {
            operator: end,
            role: BoundaryRole::Head
        }
    );
    assert!(builder.plan().is_empty());
}

#[test]
fn undeclared_feeder_orphans_the_body_operator() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let end = g.add_marker("end", MarkerKind::End);
    let x = g.add_operator("x");
    chain(&mut g, &[begin, a, end]);
    g.connect_operators(x, a).unwrap();

    let mut builder = PlanBuilder::new(&g);
    assert_eq!(
        builder.add_element([begin], [end]),
        Err(PlanError::OrphanedUpstreamOperator {
            operator: a,
            upstream: x
        })
    );
    assert!(builder.plan().is_empty());
}

#[test]
fn tail_feeding_another_tail_is_rejected() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let cp = g.add_marker("cp", MarkerKind::Checkpoint);
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, a, cp, end]);

    let mut builder = PlanBuilder::new(&g);
    assert_eq!(
        builder.add_element([begin], [cp, end]),
        Err(PlanError::UnexpectedSuccessor {
            tail: cp,
            successor: end
        })
    );
    // cp alone is a valid tail, and end a valid tail of the next stage
    builder.add_element([begin], [cp]).unwrap();
    builder.add_element([cp], [end]).unwrap();
    assert_eq!(builder.build().unwrap().plan().len(), 2);
}

#[test]
fn head_fed_from_its_own_region_is_rejected() {
    // begin -> a -> b -> end, with a back edge b -> back -> a
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let b = g.add_operator("b");
    let end = g.add_marker("end", MarkerKind::End);
    let back = g.add_marker("back", MarkerKind::Checkpoint);
    chain(&mut g, &[begin, a, b, end]);
    g.connect_operators(b, back).unwrap();
    g.connect_operators(back, a).unwrap();

    let mut builder = PlanBuilder::new(&g);
    assert_eq!(
        builder.add_element([begin, back], [end]),
        Err(PlanError::UnexpectedPredecessor {
            head: back,
            predecessor: b
        })
    );
}

#[test]
fn diamond_partition_covers_every_ordinary_operator_once() {
    //            +-> l -> cp1 -> l2 -+
    // begin -> s |                   +-> j -> end
    //            +-> r -> cp2 -> r2 -+
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let s = g.add_operator("split");
    let l = g.add_operator("l");
    let r = g.add_operator("r");
    let cp1 = g.add_marker("cp1", MarkerKind::Checkpoint);
    let cp2 = g.add_marker("cp2", MarkerKind::Checkpoint);
    let l2 = g.add_operator("l2");
    let r2 = g.add_operator("r2");
    let j = g.add_operator("join");
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, s, l, cp1, l2, j, end]);
    chain(&mut g, &[s, r, cp2, r2, j]);

    let mut builder = PlanBuilder::new(&g);
    let producer = builder.add_element([begin], [cp1, cp2]).unwrap();
    let consumer = builder.add_element([cp1, cp2], [end]).unwrap();
    let detail = builder.build().unwrap();
    let plan = detail.plan();

    for op in g.operators().filter(|o| !o.kind().is_marker()) {
        let owners = plan.elements().filter(|st| st.contains(op.id())).count();
        assert_eq!(owners, 1, "{} is in {owners} stages", op.name());
    }
    assert_eq!(plan.stage(producer).unwrap().outputs().len(), 2);
    assert_eq!(plan.stage(consumer).unwrap().inputs().len(), 2);
    assert_eq!(
        plan.upstream_stages(consumer).into_iter().collect::<Vec<_>>(),
        vec![producer]
    );
    verify::assert_acyclic(plan);
}

#[test]
fn body_edges_only_cross_at_boundaries() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let cp = g.add_marker("cp", MarkerKind::Checkpoint);
    let b = g.add_operator("b");
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, a, cp, b, end]);

    let mut builder = PlanBuilder::new(&g);
    builder.add_element([begin], [cp]).unwrap();
    builder.add_element([cp], [end]).unwrap();
    let detail = builder.build().unwrap();

    for stage in detail.plan().elements() {
        for op in stage.interior() {
            for n in g.predecessors(op).into_iter().chain(g.successors(op)) {
                assert!(stage.contains(n), "{op} leaks to {n}");
            }
        }
    }
}

#[test]
fn markers_between_stages_are_bridged() {
    // stage one ends at `end`, an unowned checkpoint relays to `begin2`
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let end = g.add_marker("end", MarkerKind::End);
    let relay = g.add_marker("relay", MarkerKind::Checkpoint);
    let begin2 = g.add_marker("begin2", MarkerKind::Begin);
    let b = g.add_operator("b");
    let end2 = g.add_marker("end2", MarkerKind::End);
    chain(&mut g, &[begin, a, end, relay, begin2, b, end2]);

    let stages = |config: PlannerConfig| {
        let mut builder = PlanBuilder::with_config(&g, config);
        builder.add_element([begin], [end]).unwrap();
        builder.add_element([begin2], [end2]).unwrap();
        builder.build().unwrap().into_plan()
    };

    let bridged = stages(PlannerConfig::default());
    assert_eq!(bridged.ports().filter(|p| !p.opposites().is_empty()).count(), 2);

    let direct_only = stages(PlannerConfig {
        connect_through_markers: false,
        ..Default::default()
    });
    assert!(direct_only.ports().all(|p| p.opposites().is_empty()));
}

#[test]
fn overlap_and_stage_limit_are_enforced() {
    let mut g = OperatorGraph::new();
    let begin = g.add_marker("begin", MarkerKind::Begin);
    let a = g.add_operator("a");
    let end = g.add_marker("end", MarkerKind::End);
    chain(&mut g, &[begin, a, end]);

    let mut builder = PlanBuilder::new(&g);
    let first = builder.add_element([begin], [end]).unwrap();
    assert_eq!(
        builder.add_element([begin], [end]),
        Err(PlanError::OverlappingBody {
            operator: a,
            stage: first
        })
    );

    let mut limited = PlanBuilder::with_config(
        &g,
        PlannerConfig {
            max_stages: Some(0),
            ..Default::default()
        },
    );
    assert_eq!(
        limited.add_element([begin], [end]),
        Err(PlanError::TooManyStages { limit: 0 })
    );
}
