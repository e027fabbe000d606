//! Plan markers: the operators that delimit stage boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural role of a marker operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// Entry point of a stage.
    Begin,
    /// Exit point of a stage.
    End,
    /// Materialization point: exit of the producing stage, entry of consumers.
    Checkpoint,
}

impl MarkerKind {
    /// Whether an operator of this kind may be declared as a stage head.
    pub fn can_open(self) -> bool {
        matches!(self, MarkerKind::Begin | MarkerKind::Checkpoint)
    }

    /// Whether an operator of this kind may be declared as a stage tail.
    pub fn can_close(self) -> bool {
        matches!(self, MarkerKind::End | MarkerKind::Checkpoint)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarkerKind::Begin => "begin",
            MarkerKind::End => "end",
            MarkerKind::Checkpoint => "checkpoint",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator classification seen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OperatorKind {
    #[default]
    Ordinary,
    Marker(MarkerKind),
}

impl OperatorKind {
    pub fn marker(self) -> Option<MarkerKind> {
        match self {
            OperatorKind::Marker(kind) => Some(kind),
            OperatorKind::Ordinary => None,
        }
    }

    pub fn is_marker(self) -> bool {
        self.marker().is_some()
    }
}

/// Which side of a stage a boundary marker was declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryRole {
    Head,
    Tail,
}

impl BoundaryRole {
    /// Whether `kind` may play this role.
    pub fn accepts(self, kind: OperatorKind) -> bool {
        match (self, kind.marker()) {
            (BoundaryRole::Head, Some(m)) => m.can_open(),
            (BoundaryRole::Tail, Some(m)) => m.can_close(),
            (_, None) => false,
        }
    }

    /// Human-readable list of marker kinds accepted for this role.
    pub fn expected(self) -> &'static str {
        match self {
            BoundaryRole::Head => "begin or checkpoint marker",
            BoundaryRole::Tail => "end or checkpoint marker",
        }
    }
}

impl fmt::Display for BoundaryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryRole::Head => f.write_str("head"),
            BoundaryRole::Tail => f.write_str("tail"),
        }
    }
}
