//! wirebus: an in-process publish/subscribe bus with a framed TCP bridge
//!
//! Independent units of work ("nodes") exchange topic-addressed messages
//! through a thread-safe registry without holding references to each
//! other. A remote peer may attach over a plain stream socket and receive
//! a live feed of selected topics through a small marker-framed wire
//! protocol.
//!
//! # Architecture
//!
//! ```text
//!          Manager ──────────────────────────────┐
//!             │ owns                             │ optional
//!             ▼                                  ▼
//!       TopicRegistry ◄──── publish/subscribe ── BridgeServer
//!             ▲                                  │ accept
//!             │                                  ▼
//!     one thread per Node                 BridgeNode per connection
//!                                                │
//!                                         framed TCP stream
//! ```
//!
//! Concurrency is one OS thread per node (bridges included) plus one
//! thread for the listening server; the registry's single lock is the
//! only shared synchronization point. Shutdown is cooperative: `close()`
//! runs a node's `before_close` hook, raises its cancellation flag, and
//! the node's loop returns at the next iteration boundary. Bounded
//! accept/receive timeouts exist solely to keep that flag observable.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wirebus::manager::{Manager, NodeFactory, NodeSpec};
//! use wirebus::node::{FnNode, LoopFlow, LoopPlan};
//! use wirebus::protocol::Message;
//!
//! let factory = NodeFactory::new().with("counter", |_ctx| {
//!     Arc::new(FnNode::new(|ctx| {
//!         LoopPlan::<()>::new().count(10).run(ctx.cancel_flag(), |step| {
//!             ctx.publish("count", Message::Int(step.index as i32));
//!             Ok(LoopFlow::Continue)
//!         })
//!     }))
//! });
//!
//! let manager = Manager::new();
//! manager
//!     .start(&factory, vec![NodeSpec::new("c1", "counter")])
//!     .unwrap();
//! ```

pub mod bridge;
pub mod error;
pub mod manager;
pub mod node;
pub mod protocol;
pub mod registry;
pub mod server;

pub use error::{BusError, FrameError, NodeError, Result};
pub use manager::{Manager, NodeFactory, NodeSpec};
pub use node::{
    ArgValue, Bus, CancelFlag, FnNode, LoopFlow, LoopPlan, Node, NodeArgs, NodeContext, NodeState,
};
pub use protocol::{Frame, FrameDecoder, Message, PayloadKind};
pub use registry::{SubscriberId, TopicRegistry};
pub use server::{BridgeServer, ServerConfig};
