//! Operator graph arena: the planner's read-only input.
//!
//! Operators and ports live in two flat vectors and are addressed by
//! `OperatorId`/`PortId`. An edge is recorded on both of its endpoints, so a
//! port's `opposites` always agree with the ports on the other side.

use serde::{Deserialize, Serialize};

use crate::attr::{AttributeMap, Attributed};
use crate::error::{Error, Result};
use crate::id::{GraphId, OperatorId, PortId};
use crate::marker::{MarkerKind, OperatorKind};

/// Port name used for the single input/output of markers and implicit ports.
pub const DEFAULT_INPUT: &str = "in";
pub const DEFAULT_OUTPUT: &str = "out";

/// Whether a port consumes or produces data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

#[derive(Debug)]
pub struct OperatorPort {
    id: PortId,
    owner: OperatorId,
    name: String,
    direction: PortDirection,
    opposites: Vec<PortId>,
}

impl OperatorPort {
    pub fn id(&self) -> PortId {
        self.id
    }
    pub fn owner(&self) -> OperatorId {
        self.owner
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn direction(&self) -> PortDirection {
        self.direction
    }
    /// Connected ports on other operators, in connection order.
    pub fn opposites(&self) -> &[PortId] {
        &self.opposites
    }
}

#[derive(Debug)]
pub struct Operator {
    id: OperatorId,
    name: String,
    kind: OperatorKind,
    inputs: Vec<PortId>,
    outputs: Vec<PortId>,
    attributes: AttributeMap,
}

impl Operator {
    pub fn id(&self) -> OperatorId {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> OperatorKind {
        self.kind
    }
    pub fn marker(&self) -> Option<MarkerKind> {
        self.kind.marker()
    }
    pub fn inputs(&self) -> &[PortId] {
        &self.inputs
    }
    pub fn outputs(&self) -> &[PortId] {
        &self.outputs
    }
    /// Input ports followed by output ports.
    pub fn ports(&self) -> impl Iterator<Item = PortId> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).copied()
    }
}

impl Attributed for Operator {
    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

/// Arena-backed operator graph.
#[derive(Debug)]
pub struct OperatorGraph {
    id: GraphId,
    operators: Vec<Operator>,
    ports: Vec<OperatorPort>,
}

impl Default for OperatorGraph {
    fn default() -> Self {
        Self {
            id: GraphId::fresh(),
            operators: Vec::new(),
            ports: Vec::new(),
        }
    }
}

impl OperatorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of this graph; plans remember it to refuse stages from
    /// another graph.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Adds an ordinary operator without ports.
    pub fn add_operator(&mut self, name: impl Into<String>) -> OperatorId {
        self.push_operator(name.into(), OperatorKind::Ordinary)
    }

    /// Adds a marker operator with one `in` and one `out` port.
    pub fn add_marker(&mut self, name: impl Into<String>, kind: MarkerKind) -> OperatorId {
        let id = self.push_operator(name.into(), OperatorKind::Marker(kind));
        self.push_port(id, DEFAULT_INPUT.to_string(), PortDirection::Input);
        self.push_port(id, DEFAULT_OUTPUT.to_string(), PortDirection::Output);
        id
    }

    pub fn add_input(&mut self, operator: OperatorId, name: impl Into<String>) -> Result<PortId> {
        self.check_operator(operator)?;
        Ok(self.push_port(operator, name.into(), PortDirection::Input))
    }

    pub fn add_output(&mut self, operator: OperatorId, name: impl Into<String>) -> Result<PortId> {
        self.check_operator(operator)?;
        Ok(self.push_port(operator, name.into(), PortDirection::Output))
    }

    /// Connects an output port to an input port. Connecting twice is a no-op.
    pub fn connect(&mut self, upstream: PortId, downstream: PortId) -> Result<()> {
        self.check_edge(upstream, downstream)?;
        let up = &mut self.ports[upstream.index()].opposites;
        if !up.contains(&downstream) {
            up.push(downstream);
        }
        let down = &mut self.ports[downstream.index()].opposites;
        if !down.contains(&upstream) {
            down.push(upstream);
        }
        Ok(())
    }

    /// Removes the edge between two ports; returns whether it existed.
    pub fn disconnect(&mut self, upstream: PortId, downstream: PortId) -> Result<bool> {
        self.check_edge(upstream, downstream)?;
        let up = &mut self.ports[upstream.index()].opposites;
        let existed = up.contains(&downstream);
        up.retain(|p| *p != downstream);
        self.ports[downstream.index()]
            .opposites
            .retain(|p| *p != upstream);
        Ok(existed)
    }

    /// Connects the default output of `from` to the default input of `to`,
    /// creating `out`/`in` ports on ordinary operators when they are missing.
    pub fn connect_operators(&mut self, from: OperatorId, to: OperatorId) -> Result<()> {
        let upstream = self.default_port(from, PortDirection::Output)?;
        let downstream = self.default_port(to, PortDirection::Input)?;
        self.connect(upstream, downstream)
    }

    /// Reroutes every edge leaving `output` through a new marker operator and
    /// returns the marker.
    pub fn insert_marker(
        &mut self,
        output: PortId,
        kind: MarkerKind,
        name: impl Into<String>,
    ) -> Result<OperatorId> {
        let port = self.port(output).ok_or(Error::UnknownPort(output))?;
        if port.direction != PortDirection::Output {
            return Err(Error::PortDirection {
                upstream: output,
                downstream: output,
            });
        }
        let downstream: Vec<PortId> = port.opposites.clone();
        let marker = self.add_marker(name, kind);
        let marker_in = self.operators[marker.index()].inputs[0];
        let marker_out = self.operators[marker.index()].outputs[0];
        for d in &downstream {
            self.disconnect(output, *d)?;
            self.connect(marker_out, *d)?;
        }
        self.connect(output, marker_in)?;
        Ok(marker)
    }

    pub fn operator(&self, id: OperatorId) -> Option<&Operator> {
        self.operators.get(id.index())
    }

    pub fn operator_mut(&mut self, id: OperatorId) -> Option<&mut Operator> {
        self.operators.get_mut(id.index())
    }

    pub fn port(&self, id: PortId) -> Option<&OperatorPort> {
        self.ports.get(id.index())
    }

    pub fn operators(&self) -> impl Iterator<Item = &Operator> {
        self.operators.iter()
    }

    pub fn contains(&self, id: OperatorId) -> bool {
        id.index() < self.operators.len()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Marker kind query; `Ordinary` for unknown ids.
    pub fn kind(&self, id: OperatorId) -> OperatorKind {
        self.operator(id)
            .map(Operator::kind)
            .unwrap_or(OperatorKind::Ordinary)
    }

    /// First operator with the given name.
    pub fn find(&self, name: &str) -> Option<OperatorId> {
        self.operators.iter().find(|o| o.name == name).map(|o| o.id)
    }

    /// Port of `operator` with the given direction and name.
    pub fn find_port(
        &self,
        operator: OperatorId,
        direction: PortDirection,
        name: &str,
    ) -> Result<PortId> {
        let op = self
            .operator(operator)
            .ok_or(Error::UnknownOperator(operator))?;
        let ports = match direction {
            PortDirection::Input => &op.inputs,
            PortDirection::Output => &op.outputs,
        };
        ports
            .iter()
            .copied()
            .find(|p| self.ports[p.index()].name == name)
            .ok_or_else(|| Error::NoSuchPort {
                operator,
                direction: direction.as_str(),
                name: name.to_string(),
            })
    }

    /// Distinct upstream operators, in port order.
    pub fn predecessors(&self, id: OperatorId) -> Vec<OperatorId> {
        self.neighbours(id, PortDirection::Input)
    }

    /// Distinct downstream operators, in port order.
    pub fn successors(&self, id: OperatorId) -> Vec<OperatorId> {
        self.neighbours(id, PortDirection::Output)
    }

    fn neighbours(&self, id: OperatorId, direction: PortDirection) -> Vec<OperatorId> {
        let Some(op) = self.operator(id) else {
            return Vec::new();
        };
        let ports = match direction {
            PortDirection::Input => &op.inputs,
            PortDirection::Output => &op.outputs,
        };
        let mut out = Vec::new();
        for p in ports {
            for q in &self.ports[p.index()].opposites {
                let owner = self.ports[q.index()].owner;
                if !out.contains(&owner) {
                    out.push(owner);
                }
            }
        }
        out
    }

    fn default_port(&mut self, operator: OperatorId, direction: PortDirection) -> Result<PortId> {
        let op = self
            .operator(operator)
            .ok_or(Error::UnknownOperator(operator))?;
        let existing = match direction {
            PortDirection::Input => op.inputs.first().copied(),
            PortDirection::Output => op.outputs.first().copied(),
        };
        match existing {
            Some(p) => Ok(p),
            None => {
                let name = match direction {
                    PortDirection::Input => DEFAULT_INPUT,
                    PortDirection::Output => DEFAULT_OUTPUT,
                };
                Ok(self.push_port(operator, name.to_string(), direction))
            }
        }
    }

    fn check_operator(&self, id: OperatorId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Error::UnknownOperator(id))
        }
    }

    fn check_edge(&self, upstream: PortId, downstream: PortId) -> Result<()> {
        let up = self.port(upstream).ok_or(Error::UnknownPort(upstream))?;
        let down = self.port(downstream).ok_or(Error::UnknownPort(downstream))?;
        if up.direction != PortDirection::Output || down.direction != PortDirection::Input {
            return Err(Error::PortDirection {
                upstream,
                downstream,
            });
        }
        if up.owner == down.owner {
            return Err(Error::SelfLoop(up.owner));
        }
        Ok(())
    }

    fn push_operator(&mut self, name: String, kind: OperatorKind) -> OperatorId {
        let id = OperatorId::from_index(self.operators.len());
        self.operators.push(Operator {
            id,
            name,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: AttributeMap::new(),
        });
        id
    }

    fn push_port(&mut self, owner: OperatorId, name: String, direction: PortDirection) -> PortId {
        let id = PortId::from_index(self.ports.len());
        self.ports.push(OperatorPort {
            id,
            owner,
            name,
            direction,
            opposites: Vec::new(),
        });
        let op = &mut self.operators[owner.index()];
        match direction {
            PortDirection::Input => op.inputs.push(id),
            PortDirection::Output => op.outputs.push(id),
        }
        id
    }
}
