//! Marker-driven stage partitioning.
//!
//! For one stage the caller declares *heads* (entry markers) and *tails* (exit
//! markers). The body is the set of operators lying on some head→tail path:
//! forward reachability from the heads (not expanding tails) intersected with
//! backward reachability from the tails (not expanding heads). The body is
//! accepted only if it is closed: every edge touching it either stays inside
//! or passes through one of the declared markers.
//!
//! A checkpoint sits between stages, so edges into a checkpoint head or out
//! of a checkpoint tail are ordinary stage boundaries. `Begin` and `End` are
//! stricter: a `Begin` head may only be fed by markers, and an `End` tail may
//! only feed markers.
//!
//! Checks run in a fixed order and report the first violation, visiting heads
//! and tails in declaration order and interior operators by ascending id.

use std::collections::{BTreeMap, BTreeSet};

use flowplan_core::config::PlannerConfig;
use flowplan_core::graph::OperatorGraph;
use flowplan_core::id::{OperatorId, StageId, StagePortId};
use flowplan_core::marker::{BoundaryRole, MarkerKind, OperatorKind};

use crate::detail::PlanDetail;
use crate::error::{PlanError, Result};
use crate::plan::{Plan, Stage};
use crate::verify;

/// Forward/backward operator adjacency, computed once per frozen graph.
#[derive(Debug, Clone)]
pub struct Adjacency {
    fwd: Vec<Vec<OperatorId>>,
    bwd: Vec<Vec<OperatorId>>,
}

impl Adjacency {
    pub fn of(graph: &OperatorGraph) -> Self {
        let mut fwd = Vec::with_capacity(graph.len());
        let mut bwd = Vec::with_capacity(graph.len());
        for op in graph.operators() {
            fwd.push(graph.successors(op.id()));
            bwd.push(graph.predecessors(op.id()));
        }
        Self { fwd, bwd }
    }

    pub fn successors(&self, id: OperatorId) -> &[OperatorId] {
        self.fwd.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, id: OperatorId) -> &[OperatorId] {
        self.bwd.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.fwd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fwd.is_empty()
    }
}

/// A validated, not yet registered stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StageShape {
    pub heads: Vec<OperatorId>,
    pub tails: Vec<OperatorId>,
    pub body: BTreeSet<OperatorId>,
}

fn dedup(ops: &[OperatorId]) -> Vec<OperatorId> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        if !out.contains(op) {
            out.push(*op);
        }
    }
    out
}

/// Marks everything reachable from `seeds` along `next`, never expanding
/// operators flagged in `stop`. Seeds are always marked.
fn reach_from<'a>(
    seeds: &[OperatorId],
    stop: &[bool],
    n: usize,
    next: impl Fn(OperatorId) -> &'a [OperatorId],
) -> Vec<bool> {
    let mut seen = vec![false; n];
    let mut stack = Vec::new();
    for s in seeds {
        if !seen[s.index()] {
            seen[s.index()] = true;
            stack.push(*s);
        }
    }
    while let Some(op) = stack.pop() {
        if stop[op.index()] {
            continue;
        }
        for neighbour in next(op) {
            if !seen[neighbour.index()] {
                seen[neighbour.index()] = true;
                stack.push(*neighbour);
            }
        }
    }
    seen
}

/// Computes and validates the body enclosed by `heads` and `tails`.
pub(crate) fn close_stage(
    graph: &OperatorGraph,
    adjacency: &Adjacency,
    heads: &[OperatorId],
    tails: &[OperatorId],
) -> Result<StageShape> {
    let heads = dedup(heads);
    let tails = dedup(tails);
    if heads.is_empty() {
        return Err(PlanError::EmptyBoundary(BoundaryRole::Head));
    }
    if tails.is_empty() {
        return Err(PlanError::EmptyBoundary(BoundaryRole::Tail));
    }

    // 1. boundary kinds
    for (ops, role) in [(&heads, BoundaryRole::Head), (&tails, BoundaryRole::Tail)] {
        for op in ops {
            if !graph.contains(*op) {
                return Err(PlanError::UnknownOperator(*op));
            }
            if !role.accepts(graph.kind(*op)) {
                return Err(PlanError::NotAPlanMarker {
                    operator: *op,
                    role,
                });
            }
        }
    }

    let n = graph.len();
    let mut is_head = vec![false; n];
    let mut is_tail = vec![false; n];
    for h in &heads {
        is_head[h.index()] = true;
    }
    for t in &tails {
        is_tail[t.index()] = true;
    }

    let forward = reach_from(&heads, &is_tail, n, |op| adjacency.successors(op));
    let backward = reach_from(&tails, &is_head, n, |op| adjacency.predecessors(op));

    let is_ordinary = |op: OperatorId| !graph.kind(op).is_marker();

    // 2. heads must not be fed from inside the region they open; `Begin` also
    //    refuses ordinary feeders
    for h in &heads {
        let begin = graph.kind(*h) == OperatorKind::Marker(MarkerKind::Begin);
        if let Some(p) = adjacency.predecessors(*h).iter().find(|p| {
            forward[p.index()] || (begin && !is_head[p.index()] && is_ordinary(**p))
        }) {
            return Err(PlanError::UnexpectedPredecessor {
                head: *h,
                predecessor: *p,
            });
        }
    }

    // 3. tails must not feed the region they close; `End` also refuses
    //    ordinary consumers
    for t in &tails {
        let end = graph.kind(*t) == OperatorKind::Marker(MarkerKind::End);
        if let Some(s) = adjacency.successors(*t).iter().find(|s| {
            backward[s.index()] || (end && !is_tail[s.index()] && is_ordinary(**s))
        }) {
            return Err(PlanError::UnexpectedSuccessor {
                tail: *t,
                successor: *s,
            });
        }
    }

    // 4. closure
    let in_body = |op: OperatorId| forward[op.index()] && backward[op.index()];

    for h in &heads {
        if !backward[h.index()] {
            return Err(PlanError::OrphanedHead {
                head: *h,
                operator: *h,
            });
        }
        if let Some(s) = adjacency.successors(*h).iter().find(|s| !in_body(**s)) {
            return Err(PlanError::OrphanedHead {
                head: *h,
                operator: *s,
            });
        }
    }

    for t in &tails {
        if !forward[t.index()] {
            return Err(PlanError::OrphanedTail {
                tail: *t,
                operator: *t,
            });
        }
        if let Some(p) = adjacency.predecessors(*t).iter().find(|p| !in_body(**p)) {
            return Err(PlanError::OrphanedTail {
                tail: *t,
                operator: *p,
            });
        }
    }

    let body: BTreeSet<OperatorId> = (0..n)
        .map(|i| OperatorId::new(i as u32))
        .filter(|op| in_body(*op))
        .collect();

    for op in body.iter().filter(|o| !is_head[o.index()] && !is_tail[o.index()]) {
        if let Some(p) = adjacency.predecessors(*op).iter().find(|p| !in_body(**p)) {
            return Err(PlanError::OrphanedUpstreamOperator {
                operator: *op,
                upstream: *p,
            });
        }
        if let Some(s) = adjacency.successors(*op).iter().find(|s| !in_body(**s)) {
            return Err(PlanError::OrphanedDownstreamOperator {
                operator: *op,
                downstream: *s,
            });
        }
    }

    Ok(StageShape { heads, tails, body })
}

/// Builds a [`Plan`] stage by stage against one frozen operator graph and
/// finishes it into a [`PlanDetail`].
///
/// ```ignore
/// let mut builder = PlanBuilder::new(&graph);
/// builder.add_element([begin], [cp])?;
/// builder.add_element([cp], [end])?;
/// let detail = builder.build()?;
/// ```
pub struct PlanBuilder<'g> {
    graph: &'g OperatorGraph,
    adjacency: Adjacency,
    config: PlannerConfig,
    plan: Plan,
}

impl<'g> PlanBuilder<'g> {
    pub fn new(graph: &'g OperatorGraph) -> Self {
        Self::with_config(graph, PlannerConfig::default())
    }

    pub fn with_config(graph: &'g OperatorGraph, config: PlannerConfig) -> Self {
        Self {
            graph,
            adjacency: Adjacency::of(graph),
            config,
            plan: Plan::new(),
        }
    }

    pub fn graph(&self) -> &'g OperatorGraph {
        self.graph
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The plan built so far.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Attaches attributes to an accepted stage before the plan is built.
    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.plan.stage_mut(id)
    }

    /// Validates one stage and registers it; nothing is registered on error.
    pub fn add_element(
        &mut self,
        heads: impl IntoIterator<Item = OperatorId>,
        tails: impl IntoIterator<Item = OperatorId>,
    ) -> Result<StageId> {
        let heads: Vec<OperatorId> = heads.into_iter().collect();
        let tails: Vec<OperatorId> = tails.into_iter().collect();
        let result =
            self.plan
                .add_element_with(self.graph, &self.adjacency, &heads, &tails, &self.config);

        #[cfg(feature = "tracing")]
        match &result {
            Ok(stage) => tracing::debug!(
                stage = %stage,
                heads = heads.len(),
                tails = tails.len(),
                "stage accepted"
            ),
            Err(e) => tracing::debug!(error = %e, kind = ?e.kind(), "stage rejected"),
        }

        result
    }

    /// Wires stage ports across stage boundaries, verifies the stage graph,
    /// and indexes the result.
    pub fn build(mut self) -> Result<PlanDetail> {
        #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
        let links = self.wire_opposites()?;
        if self.config.verify_acyclic {
            verify::check_acyclic(&self.plan)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            stages = self.plan.len(),
            links,
            operators = self.graph.len(),
            "plan built"
        );

        Ok(PlanDetail::index(self.graph, self.plan))
    }

    /// Connects each stage output to the stage inputs whose head marker is
    /// the output's own marker or lies behind it on a chain of markers that
    /// belong to no stage.
    fn wire_opposites(&mut self) -> Result<usize> {
        let mut owned: BTreeSet<OperatorId> = BTreeSet::new();
        let mut inputs_by_marker: BTreeMap<OperatorId, Vec<StagePortId>> = BTreeMap::new();
        for stage in self.plan.elements() {
            owned.extend(stage.body().iter().copied());
            for (head, input) in stage.heads().iter().zip(stage.inputs()) {
                inputs_by_marker.entry(*head).or_default().push(*input);
            }
        }

        let outputs: Vec<(StagePortId, OperatorId)> = self
            .plan
            .ports()
            .filter(|p| p.is_output())
            .map(|p| (p.id(), p.marker()))
            .collect();

        let mut links = 0usize;
        for (output, marker) in outputs {
            let owner = self.plan.port(output).map(|p| p.owner());
            for target in self.downstream_markers(marker, &owned) {
                let Some(inputs) = inputs_by_marker.get(&target) else {
                    continue;
                };
                for input in inputs {
                    if self.plan.port(*input).map(|p| p.owner()) == owner {
                        continue;
                    }
                    if self.plan.connect(output, *input)? {
                        links += 1;
                        #[cfg(feature = "tracing")]
                        tracing::trace!(upstream = %output, downstream = %input, "wired stage ports");
                    }
                }
            }
        }
        Ok(links)
    }

    fn downstream_markers(
        &self,
        from: OperatorId,
        owned: &BTreeSet<OperatorId>,
    ) -> BTreeSet<OperatorId> {
        let mut found = BTreeSet::from([from]);
        let mut stack = vec![from];
        while let Some(op) = stack.pop() {
            for next in self.adjacency.successors(op) {
                if !self.graph.kind(*next).is_marker() {
                    continue;
                }
                if found.insert(*next)
                    && self.config.connect_through_markers
                    && !owned.contains(next)
                {
                    stack.push(*next);
                }
            }
        }
        found
    }
}
