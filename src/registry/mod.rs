//! Topic registry (broker) for pub/sub routing
//!
//! The registry is the only state shared across all nodes: a map from
//! topic to subscriber list, serialized by a single lock. Publishing takes
//! a snapshot of the list under the lock and fans the message out
//! synchronously after releasing it, in registration order, handing each
//! subscriber its own copy of the message.
//!
//! ```text
//!                    TopicRegistry
//!              ┌───────────────────────────┐
//!              │ topics: Mutex<HashMap<    │
//!              │   String,                 │
//!              │   Vec<(id, name, cb)>>>   │
//!              └────────────┬──────────────┘
//!                           │ publish(topic, m)
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!     cb(topic, m')    cb(topic, m')    cb(topic, m')
//! ```

pub mod store;

pub use store::{CallbackError, SubscriberCallback, SubscriberId, TopicRegistry};
