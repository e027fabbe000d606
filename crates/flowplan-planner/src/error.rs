//! Structured planning diagnostics.
//!
//! Every builder failure names the offending operator(s) so tooling can point
//! at a precise location instead of parsing a message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowplan_core::id::{GraphId, OperatorId, StageId, StagePortId};
use flowplan_core::marker::BoundaryRole;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{operator} is not a plan marker usable as a stage {role} (expected {expected})", expected = .role.expected())]
    NotAPlanMarker {
        operator: OperatorId,
        role: BoundaryRole,
    },

    #[error("stage head {head} has an unexpected predecessor {predecessor} inside the stage")]
    UnexpectedPredecessor {
        head: OperatorId,
        predecessor: OperatorId,
    },

    #[error("stage tail {tail} has an unexpected successor {successor} inside the stage")]
    UnexpectedSuccessor {
        tail: OperatorId,
        successor: OperatorId,
    },

    #[error("stage head {head} is orphaned: {operator} does not reach any declared tail")]
    OrphanedHead {
        head: OperatorId,
        operator: OperatorId,
    },

    #[error("stage tail {tail} is orphaned: {operator} is not reached from any declared head")]
    OrphanedTail {
        tail: OperatorId,
        operator: OperatorId,
    },

    #[error("{operator} has an upstream operator {upstream} outside the stage")]
    OrphanedUpstreamOperator {
        operator: OperatorId,
        upstream: OperatorId,
    },

    #[error("{operator} has a downstream operator {downstream} outside the stage")]
    OrphanedDownstreamOperator {
        operator: OperatorId,
        downstream: OperatorId,
    },

    #[error("stage has no {0} markers")]
    EmptyBoundary(BoundaryRole),

    #[error("unknown operator: {0}")]
    UnknownOperator(OperatorId),

    #[error("{operator} already belongs to {stage}")]
    OverlappingBody { operator: OperatorId, stage: StageId },

    #[error("plan exceeds the configured limit of {limit} stages")]
    TooManyStages { limit: usize },

    #[error("stage graph contains a cycle through {stage}")]
    CyclicPlan { stage: StageId },

    #[error("plan holds stages of {plan}; cannot add a stage from {graph}")]
    ForeignGraph { plan: GraphId, graph: GraphId },

    #[error("unknown stage port: {0}")]
    UnknownStagePort(StagePortId),

    #[error("stage ports {upstream} and {downstream} belong to the same stage")]
    SameStage {
        upstream: StagePortId,
        downstream: StagePortId,
    },

    #[error("{upstream} must be a stage output and {downstream} a stage input")]
    DirectionMismatch {
        upstream: StagePortId,
        downstream: StagePortId,
    },
}

/// Flat classification of [`PlanError`] for tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    NotAPlanMarker,
    UnexpectedPredecessor,
    UnexpectedSuccessor,
    OrphanedHead,
    OrphanedTail,
    OrphanedUpstreamOperator,
    OrphanedDownstreamOperator,
    EmptyBoundary,
    UnknownOperator,
    OverlappingBody,
    TooManyStages,
    CyclicPlan,
    ForeignGraph,
    InvalidRewire,
}

impl PlanError {
    pub fn kind(&self) -> DiagnosticKind {
        use PlanError::*;
        match self {
            NotAPlanMarker { .. } => DiagnosticKind::NotAPlanMarker,
            UnexpectedPredecessor { .. } => DiagnosticKind::UnexpectedPredecessor,
            UnexpectedSuccessor { .. } => DiagnosticKind::UnexpectedSuccessor,
            OrphanedHead { .. } => DiagnosticKind::OrphanedHead,
            OrphanedTail { .. } => DiagnosticKind::OrphanedTail,
            OrphanedUpstreamOperator { .. } => DiagnosticKind::OrphanedUpstreamOperator,
            OrphanedDownstreamOperator { .. } => DiagnosticKind::OrphanedDownstreamOperator,
            EmptyBoundary(_) => DiagnosticKind::EmptyBoundary,
            UnknownOperator(_) => DiagnosticKind::UnknownOperator,
            OverlappingBody { .. } => DiagnosticKind::OverlappingBody,
            TooManyStages { .. } => DiagnosticKind::TooManyStages,
            CyclicPlan { .. } => DiagnosticKind::CyclicPlan,
            ForeignGraph { .. } => DiagnosticKind::ForeignGraph,
            UnknownStagePort(_) | SameStage { .. } | DirectionMismatch { .. } => {
                DiagnosticKind::InvalidRewire
            }
        }
    }

    /// The operator a diagnostic should be reported against, if any.
    pub fn operator(&self) -> Option<OperatorId> {
        use PlanError::*;
        match self {
            NotAPlanMarker { operator, .. } => Some(*operator),
            UnexpectedPredecessor { head, .. } => Some(*head),
            UnexpectedSuccessor { tail, .. } => Some(*tail),
            OrphanedHead { head, .. } => Some(*head),
            OrphanedTail { tail, .. } => Some(*tail),
            OrphanedUpstreamOperator { operator, .. } => Some(*operator),
            OrphanedDownstreamOperator { operator, .. } => Some(*operator),
            UnknownOperator(operator) => Some(*operator),
            OverlappingBody { operator, .. } => Some(*operator),
            EmptyBoundary(_)
            | TooManyStages { .. }
            | CyclicPlan { .. }
            | ForeignGraph { .. }
            | UnknownStagePort(_)
            | SameStage { .. }
            | DirectionMismatch { .. } => None,
        }
    }

    /// Whether the error comes from structural validation of a stage boundary.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            DiagnosticKind::NotAPlanMarker
                | DiagnosticKind::UnexpectedPredecessor
                | DiagnosticKind::UnexpectedSuccessor
                | DiagnosticKind::OrphanedHead
                | DiagnosticKind::OrphanedTail
                | DiagnosticKind::OrphanedUpstreamOperator
                | DiagnosticKind::OrphanedDownstreamOperator
        )
    }
}
