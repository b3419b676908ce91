//! Node runtime
//!
//! A node is an independently scheduled unit of work: the supervisor gives
//! it a dedicated OS thread running [`Node::run`] with a [`NodeContext`]
//! for publishing and subscribing. Shutdown is cooperative: `close()`
//! invokes [`Node::before_close`] synchronously, then raises the node's
//! cancellation flag, and the node's own loop observes the flag at an
//! iteration boundary and returns. Threads are never forcibly terminated.
//!
//! Nodes take `&self` in both hooks so the supervisor can invoke
//! `before_close` from its own thread while `run` executes on the node's;
//! node-local mutable state lives behind interior mutability.

pub mod args;
pub mod context;
pub mod plan;
pub mod state;

use crate::error::Result;
use crate::protocol::Message;
use crate::registry::{SubscriberCallback, SubscriberId};

pub use args::{ArgValue, NodeArgs};
pub use context::NodeContext;
pub use plan::{LoopFlow, LoopPlan, Step};
pub use state::{CancelFlag, NodeState, StateCell};

/// The bus surface a node sees: publish/subscribe plus the administrative
/// shutdown request
///
/// Implemented by the supervisor's shared core; kept as a trait so nodes
/// and bridges never hold a concrete supervisor reference.
pub trait Bus: Send + Sync {
    /// Deliver a message to every subscriber of `topic`
    fn publish(&self, topic: &str, message: Message);

    /// Register a subscription under the given identity
    fn subscribe(&self, topic: &str, id: SubscriberId, name: &str, callback: SubscriberCallback);

    /// Remove every subscription of `id` to `topic`
    fn unsubscribe(&self, topic: &str, id: SubscriberId);

    /// Allocate a fresh subscriber identity
    fn allocate_id(&self) -> SubscriberId;

    /// Request close of every managed node
    fn shutdown_all(&self);
}

/// A unit of work scheduled on its own thread
pub trait Node: Send + Sync {
    /// Node body; executes once on the node's dedicated thread
    ///
    /// Long-running nodes should iterate through a [`LoopPlan`] so the
    /// cancellation flag is observed at every iteration boundary.
    fn run(&self, ctx: &NodeContext) -> Result<()>;

    /// Release hook invoked synchronously by `close()` before the
    /// cancellation flag is raised
    ///
    /// Runs on the closing thread, not the node's own. Re-invocation on a
    /// repeated `close()` is not guarded here; authors needing idempotency
    /// must guard themselves.
    fn before_close(&self, ctx: &NodeContext) {
        let _ = ctx;
    }
}

/// Build a node from closures
///
/// Keeps small publisher/subscriber nodes terse in tests and demos
/// without a dedicated type per node.
pub struct FnNode {
    run: Box<dyn Fn(&NodeContext) -> Result<()> + Send + Sync>,
    before_close: Option<Box<dyn Fn(&NodeContext) + Send + Sync>>,
}

impl FnNode {
    /// Node whose `run` is the given closure
    pub fn new(run: impl Fn(&NodeContext) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            run: Box::new(run),
            before_close: None,
        }
    }

    /// Attach a `before_close` hook
    pub fn with_before_close(
        mut self,
        hook: impl Fn(&NodeContext) + Send + Sync + 'static,
    ) -> Self {
        self.before_close = Some(Box::new(hook));
        self
    }
}

impl Node for FnNode {
    fn run(&self, ctx: &NodeContext) -> Result<()> {
        (self.run)(ctx)
    }

    fn before_close(&self, ctx: &NodeContext) {
        if let Some(hook) = &self.before_close {
            hook(ctx);
        }
    }
}
