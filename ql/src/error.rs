//! Error types for quantized iteration

use thiserror::Error;

/// Errors raised when building or configuring a quantized iterator
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("Step must be at least 1 element per quantum")]
    ZeroStep,

    #[error("Pacing sets both step and budget-ms; pick one")]
    ConflictingPacing,

    #[error("Executor can only be replaced before the first run (state: {state})")]
    AlreadyStarted { state: crate::quantum::LoopState },

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Errors an executor reports when it cannot accept a continuation
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Executor {label} is closed")]
    Closed { label: String },
}
