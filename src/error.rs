use thiserror::Error;

/// Errors from the execution-engine collaborator.
///
/// Both variants are recoverable from the core's point of view: the poll loop
/// logs them and retries on the next cycle, and they never surface to the
/// waiting caller.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport-level failure reaching the engine.
    #[error("engine transport error: {0}")]
    Transport(String),

    /// The engine answered, but the response carried no usable status field.
    /// Treated the same as a transient failure, never as a silent success.
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),
}
