//! Node context: the node's handle onto the bus
//!
//! Every node runs with a [`NodeContext`] carrying its name, its
//! subscriber identity, its argument bag, its cancellation flag, and a
//! shared handle to the bus it publishes and subscribes through.

use std::sync::Arc;

use crate::node::args::NodeArgs;
use crate::node::state::CancelFlag;
use crate::node::Bus;
use crate::protocol::Message;
use crate::registry::{CallbackError, SubscriberId};

/// Per-node handle onto the bus
///
/// Cloneable; the supervisor keeps one clone for `close()` while the
/// node's thread runs with another.
#[derive(Clone)]
pub struct NodeContext {
    name: String,
    id: SubscriberId,
    bus: Arc<dyn Bus>,
    args: NodeArgs,
    cancel: CancelFlag,
}

impl NodeContext {
    /// Build a context for a named node, allocating its subscriber
    /// identity from the bus
    pub fn new(name: impl Into<String>, args: NodeArgs, bus: Arc<dyn Bus>) -> Self {
        let id = bus.allocate_id();
        Self {
            name: name.into(),
            id,
            bus,
            args,
            cancel: CancelFlag::new(),
        }
    }

    /// The node's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's subscriber identity
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The node's argument bag
    pub fn args(&self) -> &NodeArgs {
        &self.args
    }

    /// Publish a message to a topic
    pub fn publish(&self, topic: &str, message: impl Into<Message>) {
        self.bus.publish(topic, message.into());
    }

    /// Subscribe this node to a topic
    ///
    /// The callback runs on whichever thread publishes to the topic.
    pub fn subscribe<F>(&self, topic: &str, callback: F)
    where
        F: Fn(&str, Message) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.bus
            .subscribe(topic, self.id, &self.name, Arc::new(callback));
    }

    /// Remove all of this node's subscriptions to a topic
    pub fn unsubscribe(&self, topic: &str) {
        self.bus.unsubscribe(topic, self.id);
    }

    /// Whether close has been requested for this node
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_set()
    }

    /// The node's cancellation flag, for use with a loop plan
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Ask the supervisor to close every managed node
    ///
    /// The counterpart of the administrative shutdown command, reachable
    /// from inside a node (e.g. a publisher that closes the system once
    /// its work is done).
    pub fn shutdown_all(&self) {
        self.bus.shutdown_all();
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_set())
            .finish()
    }
}
