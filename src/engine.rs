//! Execution-engine collaborator seam.
//!
//! The backend that actually runs the long-running process is opaque to this
//! crate: all it must offer is a way to start an execution and a way to ask
//! for its current status.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::EngineError;
use crate::types::{ExecutionStatus, StartedExecution};

/// The opaque backend that runs long-lived executions.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Start a new execution for the given input. Returns the transaction id
    /// the caller will be correlated under, plus the engine-side reference
    /// used for later status queries.
    async fn start_execution(&self, input: JsonValue) -> Result<StartedExecution, EngineError>;

    /// Query the current status of an execution.
    async fn describe_execution(&self, execution_ref: &str)
        -> Result<ExecutionStatus, EngineError>;
}

/// Extract the status from a raw describe-execution response body.
///
/// A missing or non-string `status` field is a malformed response, which the
/// poll loop treats as transient and retries.
pub fn status_from_describe(body: &JsonValue) -> Result<ExecutionStatus, EngineError> {
    match body.get("status").and_then(|s| s.as_str()) {
        Some(token) => Ok(ExecutionStatus::from_token(token)),
        None => Err(EngineError::MalformedResponse(
            "describe response has no status field".to_string(),
        )),
    }
}
