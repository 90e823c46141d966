//! Node variants and the uniform execution contract.
//!
//! A `Node` is one unit of work in a flow chain: it owns its kind-specific
//! payload plus at most one successor. Execution is uniform across variants:
//! interceptors first, then the node body, then the successor. The first
//! failure anywhere stops all further sequential progress.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::task::JoinSet;

use crate::context::FlowContext;
use crate::error::{FlowError, FlowResult};
use crate::flow::Flow;
use crate::interceptor::Interceptor;

/// Async body of an action node.
pub type ActionFn = Arc<dyn Fn(FlowContext) -> BoxFuture<'static, FlowResult> + Send + Sync>;

/// Predicate of a conditional node.
pub type Predicate = Arc<dyn Fn(&FlowContext) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A unit of work in the execution chain.
///
/// Nodes are built through the free constructors ([`action`], [`in_sequence`],
/// [`in_parallel`]), through [`Flow`] builder methods, or by converting a
/// whole `Flow` with `Node::from`. The successor link is exclusively owned:
/// chaining moves nodes, so a chain can never alias or cycle.
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) next: Option<Box<Node>>,
}

pub(crate) enum NodeKind {
    /// Runs a single async function.
    Action(ActionFn),
    /// Runs `true_branch` when the predicate holds, then always continues.
    Conditional {
        predicate: Predicate,
        true_branch: Option<Box<Node>>,
    },
    /// Runs each sub-node's full chain in order.
    Sequence(Vec<Node>),
    /// Runs every sub-node's full chain concurrently, waiting for all.
    Parallel(Vec<Arc<Node>>),
    /// A nested flow running under its own interceptor lists.
    Subflow(Box<Flow>),
}

impl Node {
    /// Diagnostic name of this node (not required to be unique).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short label for the node's variant, for logging.
    pub fn kind_label(&self) -> &'static str {
        match &self.kind {
            NodeKind::Action(_) => "action",
            NodeKind::Conditional { .. } => "conditional",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Parallel(_) => "parallel",
            NodeKind::Subflow(_) => "flow",
        }
    }

    /// Append `next` at the end of this node's successor chain, returning the
    /// extended chain. This is how standalone multi-step chains are built
    /// before being embedded as a conditional branch or a sequence entry.
    pub fn then(mut self, next: Node) -> Node {
        self.append(next);
        self
    }

    pub(crate) fn append(&mut self, node: Node) {
        let mut slot = &mut self.next;
        while let Some(n) = slot {
            slot = &mut n.next;
        }
        *slot = Some(Box::new(node));
    }

    /// Number of nodes in this chain, successors included.
    pub(crate) fn chain_len(&self) -> usize {
        let mut count = 1;
        let mut cur = &self.next;
        while let Some(n) = cur {
            count += 1;
            cur = &n.next;
        }
        count
    }

    /// Execute this node: interceptors, body, then successor.
    ///
    /// Boxed because the walk recurses through successors and composite
    /// sub-chains.
    pub(crate) fn run<'a>(
        &'a self,
        ctx: &'a FlowContext,
        interceptors: &'a [Interceptor],
    ) -> BoxFuture<'a, FlowResult> {
        Box::pin(async move {
            for interceptor in interceptors {
                interceptor(ctx, Some(self))?;
            }

            match &self.kind {
                NodeKind::Action(f) => f(ctx.clone()).await?,
                NodeKind::Conditional {
                    predicate,
                    true_branch,
                } => {
                    // The predicate controls only whether the branch runs,
                    // never whether the chain continues.
                    if predicate(ctx) {
                        if let Some(branch) = true_branch {
                            branch.run(ctx, interceptors).await?;
                        }
                    }
                }
                NodeKind::Sequence(nodes) => {
                    for node in nodes {
                        node.run(ctx, interceptors).await?;
                    }
                }
                NodeKind::Parallel(nodes) => {
                    self.run_parallel(nodes, ctx, interceptors).await?;
                }
                NodeKind::Subflow(flow) => flow.run(ctx).await?,
            }

            match &self.next {
                Some(next) => next.run(ctx, interceptors).await,
                None => Ok(()),
            }
        })
    }

    /// Run every parallel sub-chain as its own task and wait for all of them,
    /// even after a failure. The reported error is the first failure in
    /// completion order, which is non-deterministic when several branches
    /// fail; the rest are logged and discarded.
    async fn run_parallel(
        &self,
        nodes: &[Arc<Node>],
        ctx: &FlowContext,
        interceptors: &[Interceptor],
    ) -> FlowResult {
        let mut join_set = JoinSet::new();
        for node in nodes {
            let node = Arc::clone(node);
            let ctx = ctx.clone();
            let interceptors = interceptors.to_vec();
            join_set.spawn(async move { node.run(&ctx, &interceptors).await });
        }

        let mut first_failure: Option<FlowError> = None;
        while let Some(joined) = join_set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                // A panicked branch still counts as a failure.
                Err(join_err) => Err(FlowError::Other(anyhow::Error::new(join_err))),
            };
            if let Err(err) = result {
                if first_failure.is_none() {
                    first_failure = Some(err);
                } else {
                    tracing::warn!(
                        run_id = %ctx.run_id(),
                        node = self.name.as_str(),
                        error = %err,
                        "discarding additional parallel branch failure"
                    );
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind_label())
            .field("chain_len", &self.chain_len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Create a standalone action node wrapping a single async function.
pub fn action<F, Fut>(name: impl Into<String>, f: F) -> Node
where
    F: Fn(FlowContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FlowResult> + Send + 'static,
{
    Node {
        name: name.into(),
        kind: NodeKind::Action(Arc::new(move |ctx| -> BoxFuture<'static, FlowResult> {
            Box::pin(f(ctx))
        })),
        next: None,
    }
}

pub(crate) fn conditional<P>(
    name: impl Into<String>,
    predicate: P,
    true_branch: Option<Node>,
) -> Node
where
    P: Fn(&FlowContext) -> bool + Send + Sync + 'static,
{
    Node {
        name: name.into(),
        kind: NodeKind::Conditional {
            predicate: Arc::new(predicate),
            true_branch: true_branch.map(Box::new),
        },
        next: None,
    }
}

/// Create a sequence node running the given sub-chains strictly in order.
///
/// Accepts both `Node` and `Option<Node>` items; `None` entries are dropped.
pub fn in_sequence<I>(name: impl Into<String>, nodes: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Option<Node>>,
{
    Node {
        name: name.into(),
        kind: NodeKind::Sequence(nodes.into_iter().filter_map(Into::into).collect()),
        next: None,
    }
}

/// Create a parallel node running the given sub-chains concurrently.
///
/// Accepts both `Node` and `Option<Node>` items; `None` entries are dropped.
pub fn in_parallel<I>(name: impl Into<String>, nodes: I) -> Node
where
    I: IntoIterator,
    I::Item: Into<Option<Node>>,
{
    Node {
        name: name.into(),
        kind: NodeKind::Parallel(
            nodes
                .into_iter()
                .filter_map(Into::into)
                .map(Arc::new)
                .collect(),
        ),
        next: None,
    }
}
