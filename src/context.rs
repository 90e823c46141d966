//! Execution context threaded through every node of a running flow.
//!
//! `FlowContext` carries cancellation, an optional deadline, and a shared
//! value map. The engine itself never inspects the token or the deadline
//! (see `interceptor::cancellation_guard` for the opt-in check); it only
//! passes the context along to action bodies and predicates.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Cancellable context for one flow invocation.
///
/// Cloning is cheap and every clone observes the same token and value map,
/// so parallel branches can publish values for each other. The `run_id` is
/// a time-sortable UUID v7 used only for log correlation.
#[derive(Debug, Clone)]
pub struct FlowContext {
    run_id: Uuid,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<DashMap<String, Value>>,
}

impl FlowContext {
    /// Create a fresh context with its own cancellation token and no deadline.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a context driven by an externally owned cancellation token.
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            cancellation,
            deadline: None,
            values: Arc::new(DashMap::new()),
        }
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Identifier of this invocation, for log correlation.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The cancellation token carried by this context.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Whether the carried token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The absolute deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline (if any) has passed.
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Publish a value visible to every clone of this context.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Read back a previously published value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|v| v.clone())
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new()
    }
}
