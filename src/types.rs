use serde::{Deserialize, Serialize};
use std::fmt;

/// Status reported by the execution engine for a single execution.
///
/// `Failed` carries the raw terminal token from the backend (`FAILED`,
/// `TIMED_OUT`, `ABORTED`, ...) so it can be surfaced to the caller as
/// diagnostic payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed(String),
}

impl ExecutionStatus {
    /// Map a raw status token to a status. Anything that is neither
    /// `RUNNING` nor `SUCCEEDED` is a terminal failure.
    pub fn from_token(token: &str) -> Self {
        match token {
            "RUNNING" => ExecutionStatus::Running,
            "SUCCEEDED" => ExecutionStatus::Succeeded,
            other => ExecutionStatus::Failed(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "RUNNING"),
            ExecutionStatus::Succeeded => write!(f, "SUCCEEDED"),
            ExecutionStatus::Failed(token) => write!(f, "{}", token),
        }
    }
}

/// Identifiers handed back by the engine when an execution is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedExecution {
    pub transaction_id: String,
    pub execution_ref: String,
}

/// The reply delivered to a waiting caller, exactly once per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum Reply {
    Success,
    Failure { status: String },
}
