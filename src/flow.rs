//! The `Flow` builder and execution entry point.
//!
//! A flow owns a chain of nodes plus two interceptor lists. Builder methods
//! consume and return the flow, so construction reads as one fluent
//! expression and a spliced sub-flow is gone at compile time once appended.

use std::fmt;

use crate::context::FlowContext;
use crate::error::FlowResult;
use crate::interceptor::Interceptor;
use crate::node::{self, Node, NodeKind};

/// A named, ordered node chain plus its interceptor lists.
///
/// A `Flow` satisfies the node contract through `Node::from(flow)`, so flows
/// can be embedded in other flows: as a conditional branch, as a
/// sequence/parallel entry (keeping their own interceptors), or spliced
/// inline with [`Flow::then`] (sharing the parent's interceptors).
pub struct Flow {
    name: String,
    head: Option<Box<Node>>,
    flow_interceptors: Vec<Interceptor>,
    node_interceptors: Vec<Interceptor>,
}

impl Flow {
    /// Create an empty flow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head: None,
            flow_interceptors: Vec::new(),
            node_interceptors: Vec::new(),
        }
    }

    /// Diagnostic name of this flow.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes in the flow's top-level chain.
    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |n| n.chain_len())
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append an action node running the given async function.
    pub fn action<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(FlowContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = FlowResult> + Send + 'static,
    {
        self.then(node::action(name, f))
    }

    /// Append a conditional node. When `predicate` holds at run time, the
    /// branch's full chain runs first; the flow then continues past the
    /// conditional either way, unless the branch failed.
    pub fn when<P>(
        self,
        name: impl Into<String>,
        predicate: P,
        true_branch: impl Into<Option<Node>>,
    ) -> Self
    where
        P: Fn(&FlowContext) -> bool + Send + Sync + 'static,
    {
        self.then(node::conditional(name, predicate, true_branch.into()))
    }

    /// Append an arbitrary node or a whole flow.
    ///
    /// A `Flow` argument is spliced: its chain is flattened into this flow's
    /// chain so the parent's interceptor lists apply uniformly, and the
    /// argument's own interceptor lists are discarded. Composite nodes and
    /// flows converted through other paths are appended as-is.
    pub fn then(mut self, node: impl Into<Node>) -> Self {
        match node.into() {
            Node {
                kind: NodeKind::Subflow(flow),
                next: None,
                ..
            } => self.splice(*flow),
            other => self.append(other),
        }
        self
    }

    /// Append an interceptor invoked once per `run`, before the head node,
    /// with no node argument.
    pub fn add_flow_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.flow_interceptors.push(interceptor);
        self
    }

    /// Append an interceptor invoked before every node visited during `run`,
    /// nodes inside composite sub-chains included. Interceptors are consulted
    /// at run time, so they also apply to nodes appended earlier.
    pub fn add_node_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.node_interceptors.push(interceptor);
        self
    }

    /// Execute the flow against the given context.
    ///
    /// An empty flow succeeds without invoking anything. Otherwise the
    /// flow-level interceptors run once in order (the first failure aborts),
    /// followed by the node chain from the head. The first failure anywhere
    /// is returned unchanged; everything after it is skipped, except parallel
    /// siblings already in flight, which are always waited for.
    pub async fn run(&self, ctx: &FlowContext) -> FlowResult {
        let Some(head) = &self.head else {
            return Ok(());
        };

        tracing::debug!(
            run_id = %ctx.run_id(),
            flow = self.name.as_str(),
            nodes = self.len(),
            "running flow"
        );

        for interceptor in &self.flow_interceptors {
            interceptor(ctx, None)?;
        }

        head.run(ctx, &self.node_interceptors).await
    }

    fn append(&mut self, node: Node) {
        match &mut self.head {
            Some(head) => head.append(node),
            None => self.head = Some(Box::new(node)),
        }
    }

    fn splice(&mut self, flow: Flow) {
        if let Some(head) = flow.head {
            self.append(*head);
        }
    }
}

impl From<Flow> for Node {
    /// Wrap a whole flow as a single node. When run, the flow keeps its own
    /// interceptor lists: flow-level ones fire once, node-level ones apply to
    /// its chain, and the surrounding flow's interceptors do not reach inside.
    fn from(flow: Flow) -> Node {
        Node {
            name: flow.name.clone(),
            kind: NodeKind::Subflow(Box::new(flow)),
            next: None,
        }
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("nodes", &self.len())
            .field("flow_interceptors", &self.flow_interceptors.len())
            .field("node_interceptors", &self.node_interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::interceptor::from_fn;
    use crate::node::{action, in_parallel, in_sequence};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Log, tag: &'static str) -> Node {
        let log = Arc::clone(log);
        action(tag, move |_ctx| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(tag);
                Ok(())
            }
        })
    }

    fn taken(log: &Log) -> Vec<&'static str> {
        log.lock().unwrap().clone()
    }

    fn counting_interceptor(counter: &Arc<AtomicUsize>) -> Interceptor {
        let counter = Arc::clone(counter);
        from_fn(move |_ctx, _node| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Run entry point
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn empty_flow_succeeds_and_runs_no_interceptors() {
        // Interceptors must not fire when there is no chain to run.
        let flow = Flow::new("empty")
            .add_flow_interceptor(from_fn(|_ctx, _node| {
                Err(FlowError::Rejected("must not fire".into()))
            }));

        flow.run(&FlowContext::new()).await.unwrap();
    }

    #[tokio::test]
    async fn builder_chain_runs_in_declaration_order() {
        let log = log();
        let flow = Flow::new("f")
            .then(record(&log, "a"))
            .then(record(&log, "b"))
            .action("c", {
                let log = Arc::clone(&log);
                move |_ctx| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().unwrap().push("c");
                        Ok(())
                    }
                }
            });

        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(taken(&log), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failing_flow_interceptor_prevents_the_head_node() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flow = Flow::new("f")
            .then({
                let ran = Arc::clone(&ran);
                action("head", move |_ctx| {
                    let ran = Arc::clone(&ran);
                    async move {
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            })
            .add_flow_interceptor(from_fn(|_ctx, _node| {
                Err(FlowError::Rejected("nope".into()))
            }));

        let err = flow.run(&FlowContext::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::Rejected(_)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flow_interceptor_gets_no_node_argument() {
        let saw_node = Arc::new(AtomicUsize::new(0));
        let flow = Flow::new("f")
            .then(action("noop", |_ctx| async { Ok(()) }))
            .add_flow_interceptor({
                let saw_node = Arc::clone(&saw_node);
                from_fn(move |_ctx, node| {
                    if node.is_some() {
                        saw_node.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(())
                })
            });

        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(saw_node.load(Ordering::SeqCst), 0);
    }

    // -----------------------------------------------------------------------
    // Conditional via the builder
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn false_predicate_leaves_no_branch_effects() {
        let log = log();
        let flow = Flow::new("f")
            .when("gate", |_: &FlowContext| false, record(&log, "x"))
            .then(record(&log, "y"));

        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(taken(&log), vec!["y"]);
    }

    #[tokio::test]
    async fn predicate_reads_the_context() {
        let log = log();
        let ctx = FlowContext::new();
        ctx.insert("enabled", serde_json::json!(true));

        let flow = Flow::new("f").when(
            "gate",
            |ctx: &FlowContext| ctx.get("enabled") == Some(serde_json::json!(true)),
            record(&log, "branch"),
        );

        flow.run(&ctx).await.unwrap();
        assert_eq!(taken(&log), vec!["branch"]);
    }

    // -----------------------------------------------------------------------
    // Splicing nested flows
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn then_splices_a_flow_into_one_chain() {
        let log = log();
        let tail_flow = Flow::new("tail")
            .then(record(&log, "c"))
            .then(record(&log, "d"));
        let flow = Flow::new("headflow")
            .then(record(&log, "a"))
            .then(record(&log, "b"))
            .then(tail_flow);

        assert_eq!(flow.len(), 4, "spliced chain must be flattened");
        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(taken(&log), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn spliced_flow_shares_the_parent_interceptor_set() {
        let parent_visits = Arc::new(AtomicUsize::new(0));
        let inner_visits = Arc::new(AtomicUsize::new(0));

        let log = log();
        let inner = Flow::new("inner")
            .then(record(&log, "c"))
            .then(record(&log, "d"))
            .add_node_interceptor(counting_interceptor(&inner_visits));

        let flow = Flow::new("outer")
            .then(record(&log, "a"))
            .then(inner)
            .add_node_interceptor(counting_interceptor(&parent_visits));

        flow.run(&FlowContext::new()).await.unwrap();
        // One uniform interceptor set over the flattened chain; the spliced
        // flow's own list is discarded.
        assert_eq!(parent_visits.load(Ordering::SeqCst), 3);
        assert_eq!(inner_visits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn splicing_an_empty_flow_is_a_no_op() {
        let log = log();
        let flow = Flow::new("f")
            .then(record(&log, "a"))
            .then(Flow::new("empty"));

        assert_eq!(flow.len(), 1);
        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(taken(&log), vec!["a"]);
    }

    // -----------------------------------------------------------------------
    // Flows embedded as nodes (not spliced)
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn subflow_branch_keeps_its_own_interceptors() {
        let parent_visits = Arc::new(AtomicUsize::new(0));
        let inner_visits = Arc::new(AtomicUsize::new(0));

        let log = log();
        let inner = Flow::new("inner")
            .then(record(&log, "i1"))
            .then(record(&log, "i2"))
            .add_node_interceptor(counting_interceptor(&inner_visits));

        let flow = Flow::new("outer")
            .when("gate", |_: &FlowContext| true, Node::from(inner))
            .then(record(&log, "after"))
            .add_node_interceptor(counting_interceptor(&parent_visits));

        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(taken(&log), vec!["i1", "i2", "after"]);
        // Parent list sees the conditional, the subflow node, and "after";
        // the inner chain runs under the inner flow's own list.
        assert_eq!(parent_visits.load(Ordering::SeqCst), 3);
        assert_eq!(inner_visits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn subflow_flow_interceptor_fires_once_per_visit() {
        let fired = Arc::new(AtomicUsize::new(0));
        let inner = Flow::new("inner")
            .then(action("noop", |_ctx| async { Ok(()) }))
            .add_flow_interceptor(counting_interceptor(&fired));

        let flow = Flow::new("outer").then(in_sequence("seq", [Node::from(inner)]));

        flow.run(&FlowContext::new()).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    // -----------------------------------------------------------------------
    // Node interceptor coverage over composite chains
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn node_interceptor_fires_once_per_node_visited() {
        let visits = Arc::new(AtomicUsize::new(0));
        let log = log();

        let flow = Flow::new("f")
            .then(record(&log, "a"))
            .then(in_sequence("seq", [record(&log, "s1"), record(&log, "s2")]))
            .then(in_parallel("par", [record(&log, "p1"), record(&log, "p2")]))
            .when("gate", |_: &FlowContext| true, record(&log, "branch"))
            .add_node_interceptor(counting_interceptor(&visits));

        flow.run(&FlowContext::new()).await.unwrap();
        // a, seq, s1, s2, par, p1, p2, gate, branch
        assert_eq!(visits.load(Ordering::SeqCst), 9);
        assert_eq!(taken(&log).len(), 6);
    }
}
