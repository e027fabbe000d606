use thiserror::Error;

use crate::id::{OperatorId, PortId};

/// Canonical result for core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown operator: {0}")]
    UnknownOperator(OperatorId),

    #[error("unknown port: {0}")]
    UnknownPort(PortId),

    #[error("port direction mismatch: {upstream} must be an output and {downstream} an input")]
    PortDirection { upstream: PortId, downstream: PortId },

    #[error("operator {0} cannot be connected to itself")]
    SelfLoop(OperatorId),

    #[error("operator {operator} has no {direction} port named '{name}'")]
    NoSuchPort {
        operator: OperatorId,
        direction: &'static str,
        name: String,
    },

    #[error("cannot fingerprint value: {0}")]
    Fingerprint(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Fingerprint(e.to_string())
    }
}
