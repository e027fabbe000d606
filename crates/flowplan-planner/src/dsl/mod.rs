//! Declarative operator graphs.

pub mod yaml;

use thiserror::Error;

use crate::error::PlanError;

pub use yaml::{parse_yaml_graph, GraphDoc, ParsedGraph, PlanConfigDoc, StageDecl};

#[derive(Debug, Error)]
pub enum DslError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("graph error: {0}")]
    Graph(#[from] flowplan_core::Error),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{0}' is declared more than once")]
    DuplicateOperator(String),

    #[error("marker '{0}' cannot declare its own ports")]
    MarkerPorts(String),

    #[error("invalid edge endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("stage {index}: {source}")]
    Stage {
        index: usize,
        #[source]
        source: PlanError,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),
}
