//! Topic registry implementation
//!
//! The central thread-safe store mapping topics to subscriber lists, and
//! the synchronous publish fan-out.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::Message;

/// Error type a subscriber callback may return; reported, never fatal
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Callback invoked for each message delivered to a subscription
pub type SubscriberCallback =
    Arc<dyn Fn(&str, Message) -> Result<(), CallbackError> + Send + Sync>;

/// Identity of a subscriber, used only for unsubscription
///
/// Allocated by the supervisor; two subscriptions under the same id to the
/// same topic are permitted and are removed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Wrap a raw id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One (identity, callback) entry in a topic's subscriber list
#[derive(Clone)]
struct Subscription {
    id: SubscriberId,
    name: String,
    callback: SubscriberCallback,
}

/// Thread-safe topic -> subscriber-list store
///
/// Every read and mutation is serialized by a single lock. `publish` takes
/// a snapshot of the subscriber list while holding the lock and invokes
/// callbacks after releasing it, so a callback may itself subscribe or
/// unsubscribe without deadlocking the in-flight fan-out.
#[derive(Default)]
pub struct TopicRegistry {
    topics: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl TopicRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscription>>> {
        // A poisoning panic in some callback's thread must not take the
        // whole bus down; the map itself is never left mid-mutation.
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a subscription to `topic`'s list, creating the list lazily
    ///
    /// Duplicate subscriptions of the same identity are kept as-is.
    pub fn subscribe(
        &self,
        topic: &str,
        id: SubscriberId,
        name: &str,
        callback: SubscriberCallback,
    ) {
        let mut topics = self.lock();
        topics
            .entry(topic.to_owned())
            .or_default()
            .push(Subscription {
                id,
                name: name.to_owned(),
                callback,
            });

        tracing::debug!(topic = %topic, subscriber = %name, id = %id, "Subscribed");
    }

    /// Remove every entry under `id` from `topic`'s list
    ///
    /// A no-op when the topic is unknown or the identity has no entries.
    /// The list itself stays in the map even when emptied.
    pub fn unsubscribe(&self, topic: &str, id: SubscriberId) {
        let mut topics = self.lock();
        if let Some(subs) = topics.get_mut(topic) {
            let before = subs.len();
            subs.retain(|sub| sub.id != id);

            if subs.len() != before {
                tracing::debug!(
                    topic = %topic,
                    id = %id,
                    removed = before - subs.len(),
                    "Unsubscribed"
                );
            }
        }
    }

    /// Deliver `message` to every current subscriber of `topic`
    ///
    /// Fan-out order is registration order as of the snapshot. Each
    /// callback receives its own copy of the message. A failing callback
    /// is reported and skipped; delivery continues with the rest of the
    /// snapshot. Publishing to an unknown topic is not an error.
    pub fn publish(&self, topic: &str, message: Message) {
        let snapshot: Vec<Subscription> = {
            let topics = self.lock();
            topics.get(topic).cloned().unwrap_or_default()
        };

        for sub in snapshot {
            if let Err(e) = (sub.callback)(topic, message.clone()) {
                tracing::warn!(
                    topic = %topic,
                    subscriber = %sub.name,
                    error = %e,
                    "Subscriber callback failed"
                );
            }
        }
    }

    /// Admin view: every known topic with its subscriber names, in
    /// registration order
    pub fn topics(&self) -> Vec<(String, Vec<String>)> {
        let topics = self.lock();
        let mut view: Vec<(String, Vec<String>)> = topics
            .iter()
            .map(|(topic, subs)| {
                (
                    topic.clone(),
                    subs.iter().map(|sub| sub.name.clone()).collect(),
                )
            })
            .collect();
        view.sort_by(|a, b| a.0.cmp(&b.0));
        view
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.lock().clear();
        tracing::debug!("Registry cleared");
    }

    /// Number of subscriptions currently held for `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, Vec::len)
    }
}
