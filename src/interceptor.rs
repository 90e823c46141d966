//! Cross-cutting hooks invoked around node execution.
//!
//! An interceptor sees every node the run visits (or the whole flow, when
//! invoked flow-level with no node argument) and can abort execution by
//! failing. The engine ships the two hooks it is asked for most: structured
//! visit logging and an opt-in cancellation/deadline guard.

use std::sync::Arc;

use crate::context::FlowContext;
use crate::error::{FlowError, FlowResult};
use crate::node::Node;

/// Hook invoked before a node runs (`Some(node)`) or once before the whole
/// flow (`None`). Returning an error aborts execution from that point.
pub type Interceptor = Arc<dyn Fn(&FlowContext, Option<&Node>) -> FlowResult + Send + Sync>;

/// Wrap a plain function or closure as an [`Interceptor`].
pub fn from_fn<F>(f: F) -> Interceptor
where
    F: Fn(&FlowContext, Option<&Node>) -> FlowResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Interceptor that logs every visit at `debug` with the run id and the
/// node's name and kind.
pub fn trace_nodes() -> Interceptor {
    from_fn(|ctx, node| {
        match node {
            Some(node) => tracing::debug!(
                run_id = %ctx.run_id(),
                node = node.name(),
                kind = node.kind_label(),
                "visiting node"
            ),
            None => tracing::debug!(run_id = %ctx.run_id(), "starting flow"),
        }
        Ok(())
    })
}

/// Interceptor that aborts the run once the context's cancellation token has
/// been cancelled or its deadline has passed.
///
/// The engine never consults the context on its own: actions already in
/// flight (parallel siblings included) are not interrupted. Install this as a
/// node interceptor to stop a run from making further progress.
pub fn cancellation_guard() -> Interceptor {
    from_fn(|ctx, _node| {
        if ctx.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        if ctx.deadline_exceeded() {
            return Err(FlowError::DeadlineExceeded);
        }
        Ok(())
    })
}
