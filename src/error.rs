/// Error taxonomy for the execution engine
///
/// Every failure a node or run can produce maps to one of these variants.
/// Executors return them directly; the engine records the display string in
/// the run log and on the failing node.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown node type: {0}")]
    UnknownType(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Execution aborted")]
    Cancelled,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("External error: {0}")]
    ExternalError(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Agent reached max iterations ({0})")]
    MaxIterations(usize),

    #[error("Workflow contains a cycle")]
    CycleDetected,

    #[error("Workflow has no entry node")]
    NoEntry,
}

impl EngineError {
    /// Short tag used for log prefixes and API error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "InvalidInput",
            EngineError::UnknownType(_) => "UnknownType",
            EngineError::ValidationFailed(_) => "ValidationFailed",
            EngineError::Cancelled => "Cancelled",
            EngineError::Timeout(_) => "Timeout",
            EngineError::ServiceUnavailable(_) => "ServiceUnavailable",
            EngineError::ExternalError(_) => "ExternalError",
            EngineError::StorageFailure(_) => "StorageFailure",
            EngineError::MaxIterations(_) => "MaxIterations",
            EngineError::CycleDetected => "CycleDetected",
            EngineError::NoEntry => "NoEntry",
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::StorageFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
