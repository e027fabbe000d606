//! Plan = an arena of stages plus an arena of stage ports.
//!
//! A stage owns a frozen body of original operators and one boundary port per
//! declared head (input) or tail (output) marker. Stage ports hold their
//! opposites as sets of `StagePortId`; every mutation goes through
//! [`Plan::connect`]/[`Plan::disconnect`], which keep both ends in sync.

use std::collections::{BTreeSet, VecDeque};

use flowplan_core::attr::{AttributeMap, Attributed};
use flowplan_core::config::PlannerConfig;
use flowplan_core::graph::{OperatorGraph, PortDirection};
use flowplan_core::id::{GraphId, OperatorId, StageId, StagePortId};

use crate::builder::{self, Adjacency, StageShape};
use crate::error::{PlanError, Result};

/// One boundary connector of a stage.
#[derive(Debug)]
pub struct StagePort {
    id: StagePortId,
    owner: StageId,
    direction: PortDirection,
    marker: OperatorId,
    opposites: BTreeSet<StagePortId>,
    attributes: AttributeMap,
}

impl StagePort {
    pub fn id(&self) -> StagePortId {
        self.id
    }
    pub fn owner(&self) -> StageId {
        self.owner
    }
    /// `Input` for stage inputs (heads), `Output` for stage outputs (tails).
    pub fn direction(&self) -> PortDirection {
        self.direction
    }
    /// The boundary marker this port was created for.
    pub fn marker(&self) -> OperatorId {
        self.marker
    }
    pub fn opposites(&self) -> &BTreeSet<StagePortId> {
        &self.opposites
    }
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

impl Attributed for StagePort {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// One partition of the operator graph.
#[derive(Debug)]
pub struct Stage {
    id: StageId,
    body: BTreeSet<OperatorId>,
    heads: Vec<OperatorId>,
    tails: Vec<OperatorId>,
    inputs: Vec<StagePortId>,
    outputs: Vec<StagePortId>,
    attributes: AttributeMap,
}

impl Stage {
    pub fn id(&self) -> StageId {
        self.id
    }

    /// Every operator enclosed by this stage, boundary markers included.
    pub fn body(&self) -> &BTreeSet<OperatorId> {
        &self.body
    }

    pub fn contains(&self, operator: OperatorId) -> bool {
        self.body.contains(&operator)
    }

    pub fn heads(&self) -> &[OperatorId] {
        &self.heads
    }

    pub fn tails(&self) -> &[OperatorId] {
        &self.tails
    }

    pub fn is_boundary(&self, operator: OperatorId) -> bool {
        self.heads.contains(&operator) || self.tails.contains(&operator)
    }

    pub fn is_interior(&self, operator: OperatorId) -> bool {
        self.contains(operator) && !self.is_boundary(operator)
    }

    /// Body operators that are neither heads nor tails.
    pub fn interior(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.body.iter().copied().filter(|o| !self.is_boundary(*o))
    }

    /// Stage inputs, in head declaration order.
    pub fn inputs(&self) -> &[StagePortId] {
        &self.inputs
    }

    /// Stage outputs, in tail declaration order.
    pub fn outputs(&self) -> &[StagePortId] {
        &self.outputs
    }

    pub fn find_input(&self, marker: OperatorId) -> Option<StagePortId> {
        self.heads
            .iter()
            .position(|h| *h == marker)
            .map(|i| self.inputs[i])
    }

    pub fn find_output(&self, marker: OperatorId) -> Option<StagePortId> {
        self.tails
            .iter()
            .position(|t| *t == marker)
            .map(|i| self.outputs[i])
    }
}

impl Attributed for Stage {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// The DAG of stages for one compiled unit of work.
///
/// A plan is bound to the graph of its first stage; stages from any other
/// graph are refused with [`PlanError::ForeignGraph`].
#[derive(Debug, Default)]
pub struct Plan {
    graph: Option<GraphId>,
    stages: Vec<Stage>,
    ports: Vec<StagePort>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph this plan's stages were cut from, once it has any.
    pub fn graph(&self) -> Option<GraphId> {
        self.graph
    }

    /// Validates `heads`/`tails` against the whole graph and registers the
    /// resulting stage, using the default [`PlannerConfig`]. Rebuilds the
    /// adjacency on every call; [`crate::PlanBuilder`] computes it once and
    /// also wires the stages together.
    pub fn add_element(
        &mut self,
        graph: &OperatorGraph,
        heads: impl IntoIterator<Item = OperatorId>,
        tails: impl IntoIterator<Item = OperatorId>,
    ) -> Result<StageId> {
        let adjacency = Adjacency::of(graph);
        let heads: Vec<OperatorId> = heads.into_iter().collect();
        let tails: Vec<OperatorId> = tails.into_iter().collect();
        self.add_element_with(
            graph,
            &adjacency,
            &heads,
            &tails,
            &PlannerConfig::default(),
        )
    }

    pub(crate) fn add_element_with(
        &mut self,
        graph: &OperatorGraph,
        adjacency: &Adjacency,
        heads: &[OperatorId],
        tails: &[OperatorId],
        config: &PlannerConfig,
    ) -> Result<StageId> {
        if let Some(plan) = self.graph.filter(|bound| *bound != graph.id()) {
            return Err(PlanError::ForeignGraph {
                plan,
                graph: graph.id(),
            });
        }
        if let Some(limit) = config.max_stages {
            if self.stages.len() >= limit {
                return Err(PlanError::TooManyStages { limit });
            }
        }
        let shape = builder::close_stage(graph, adjacency, heads, tails)?;
        if config.enforce_disjoint_bodies {
            self.check_disjoint(&shape)?;
        }
        self.graph = Some(graph.id());
        Ok(self.create_stage(shape))
    }

    /// Registers a validated stage shape. Only the builder produces shapes.
    pub(crate) fn create_stage(&mut self, shape: StageShape) -> StageId {
        let id = StageId::next(self.stages.len());
        let inputs = shape
            .heads
            .iter()
            .map(|h| self.push_port(id, PortDirection::Input, *h))
            .collect();
        let outputs = shape
            .tails
            .iter()
            .map(|t| self.push_port(id, PortDirection::Output, *t))
            .collect();
        self.stages.push(Stage {
            id,
            body: shape.body,
            heads: shape.heads,
            tails: shape.tails,
            inputs,
            outputs,
            attributes: AttributeMap::new(),
        });
        id
    }

    fn push_port(
        &mut self,
        owner: StageId,
        direction: PortDirection,
        marker: OperatorId,
    ) -> StagePortId {
        let id = StagePortId::next(self.ports.len());
        self.ports.push(StagePort {
            id,
            owner,
            direction,
            marker,
            opposites: BTreeSet::new(),
            attributes: AttributeMap::new(),
        });
        id
    }

    /// An operator may appear in two bodies only as a boundary of both.
    fn check_disjoint(&self, shape: &StageShape) -> Result<()> {
        for op in &shape.body {
            let new_boundary = shape.heads.contains(op) || shape.tails.contains(op);
            for stage in &self.stages {
                if stage.contains(*op) && (!new_boundary || stage.is_interior(*op)) {
                    return Err(PlanError::OverlappingBody {
                        operator: *op,
                        stage: stage.id,
                    });
                }
            }
        }
        Ok(())
    }

    /// All stages, in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id.index())
    }

    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.get_mut(id.index())
    }

    pub fn port(&self, id: StagePortId) -> Option<&StagePort> {
        self.ports.get(id.index())
    }

    pub fn port_mut(&mut self, id: StagePortId) -> Option<&mut StagePort> {
        self.ports.get_mut(id.index())
    }

    /// All stage ports, in creation order.
    pub fn ports(&self) -> impl Iterator<Item = &StagePort> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Boundary lookup on one stage by original marker identity.
    pub fn find_input(&self, stage: StageId, marker: OperatorId) -> Option<StagePortId> {
        self.stage(stage)?.find_input(marker)
    }

    pub fn find_output(&self, stage: StageId, marker: OperatorId) -> Option<StagePortId> {
        self.stage(stage)?.find_output(marker)
    }

    /// Links a stage output to a stage input on another stage. Returns
    /// `false` when the pair was already connected.
    pub fn connect(&mut self, upstream: StagePortId, downstream: StagePortId) -> Result<bool> {
        self.check_rewire(upstream, downstream)?;
        let added = self.ports[upstream.index()].opposites.insert(downstream);
        self.ports[downstream.index()].opposites.insert(upstream);
        Ok(added)
    }

    /// Removes the link between two ports. Returns `false` when absent.
    pub fn disconnect(&mut self, upstream: StagePortId, downstream: StagePortId) -> Result<bool> {
        self.check_rewire(upstream, downstream)?;
        let removed = self.ports[upstream.index()].opposites.remove(&downstream);
        self.ports[downstream.index()].opposites.remove(&upstream);
        Ok(removed)
    }

    /// Drops every link of `port`; returns the former opposites.
    pub fn disconnect_all(&mut self, port: StagePortId) -> Result<Vec<StagePortId>> {
        let opposites: Vec<StagePortId> = self
            .port(port)
            .ok_or(PlanError::UnknownStagePort(port))?
            .opposites
            .iter()
            .copied()
            .collect();
        for other in &opposites {
            self.ports[other.index()].opposites.remove(&port);
        }
        self.ports[port.index()].opposites.clear();
        Ok(opposites)
    }

    fn check_rewire(&self, upstream: StagePortId, downstream: StagePortId) -> Result<()> {
        let up = self
            .port(upstream)
            .ok_or(PlanError::UnknownStagePort(upstream))?;
        let down = self
            .port(downstream)
            .ok_or(PlanError::UnknownStagePort(downstream))?;
        if !up.is_output() || !down.is_input() {
            return Err(PlanError::DirectionMismatch {
                upstream,
                downstream,
            });
        }
        if up.owner == down.owner {
            return Err(PlanError::SameStage {
                upstream,
                downstream,
            });
        }
        Ok(())
    }

    /// Stages feeding `stage` through its inputs.
    pub fn upstream_stages(&self, stage: StageId) -> BTreeSet<StageId> {
        self.neighbour_stages(stage, |s| &s.inputs)
    }

    /// Stages fed by `stage` through its outputs.
    pub fn downstream_stages(&self, stage: StageId) -> BTreeSet<StageId> {
        self.neighbour_stages(stage, |s| &s.outputs)
    }

    fn neighbour_stages(
        &self,
        stage: StageId,
        ports: impl Fn(&Stage) -> &Vec<StagePortId>,
    ) -> BTreeSet<StageId> {
        let Some(s) = self.stage(stage) else {
            return BTreeSet::new();
        };
        ports(s)
            .iter()
            .flat_map(|p| self.ports[p.index()].opposites.iter())
            .map(|q| self.ports[q.index()].owner)
            .collect()
    }

    /// Stages in dependency order (producers first), ties broken by id.
    pub fn sorted_stages(&self) -> Result<Vec<StageId>> {
        let n = self.stages.len();
        let mut in_degree = vec![0usize; n];
        let mut downstream: Vec<BTreeSet<StageId>> = Vec::with_capacity(n);
        for stage in &self.stages {
            let next = self.downstream_stages(stage.id);
            for d in &next {
                in_degree[d.index()] += 1;
            }
            downstream.push(next);
        }

        let mut queue: VecDeque<StageId> = self
            .stages
            .iter()
            .filter(|s| in_degree[s.id.index()] == 0)
            .map(|s| s.id)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(s) = queue.pop_front() {
            order.push(s);
            for d in &downstream[s.index()] {
                in_degree[d.index()] -= 1;
                if in_degree[d.index()] == 0 {
                    queue.push_back(*d);
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            let stage = self
                .stages
                .iter()
                .find(|s| in_degree[s.id.index()] > 0)
                .map(|s| s.id)
                .unwrap_or(StageId::new(0));
            Err(PlanError::CyclicPlan { stage })
        }
    }
}
