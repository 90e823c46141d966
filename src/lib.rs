//! Embeddable flow execution engine.
//!
//! Compose named units of work (actions, conditionals, sequences, parallel
//! groups) into a directed chain, attach cross-cutting interceptors, and
//! execute the chain against a cancellable [`FlowContext`]. The first failure
//! anywhere stops all further sequential progress and is returned unchanged
//! to the caller; the only concurrency is inside a parallel node, whose
//! branches are always waited for, even after one of them fails.
//!
//! Flows nest: a built [`Flow`] can be spliced into another flow with
//! [`Flow::then`] (flattened under the parent's interceptors) or embedded as
//! a node via `Node::from` (keeping its own interceptors).
//!
//! ```
//! use flowline::{action, in_parallel, Flow, FlowContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> flowline::FlowResult {
//! let flow = Flow::new("ingest")
//!     .action("fetch", |_ctx| async { Ok(()) })
//!     .when("fresh", |_ctx| true, action("parse", |_ctx| async { Ok(()) }))
//!     .then(in_parallel(
//!         "fan-out",
//!         [
//!             action("index", |_ctx| async { Ok(()) }),
//!             action("notify", |_ctx| async { Ok(()) }),
//!         ],
//!     ))
//!     .add_node_interceptor(flowline::interceptor::trace_nodes());
//!
//! flow.run(&FlowContext::new()).await
//! # }
//! ```

pub mod context;
pub mod error;
pub mod flow;
pub mod interceptor;
pub mod node;

pub use context::FlowContext;
pub use error::{FlowError, FlowResult};
pub use flow::Flow;
pub use interceptor::Interceptor;
pub use node::{action, in_parallel, in_sequence, ActionFn, Node, Predicate};
