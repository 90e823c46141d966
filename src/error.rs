//! Error type shared by nodes, interceptors, and the flow entry point.
//!
//! The engine never rewrites a failure on its way up: whatever error an
//! action or interceptor returns is what `Flow::run` hands back to the
//! caller. The `Other` variant is a transparent carrier so actions can `?`
//! arbitrary errors through `anyhow`.

use thiserror::Error;

/// Result alias used across the engine.
pub type FlowResult = Result<(), FlowError>;

/// Errors that can abort a flow.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The execution context was cancelled (observed by a guard interceptor).
    #[error("flow cancelled")]
    Cancelled,

    /// The execution context's deadline passed (observed by a guard interceptor).
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An interceptor refused to let a node run.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Any other failure raised by an action body.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
