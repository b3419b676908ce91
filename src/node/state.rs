//! Node lifecycle state and cancellation flag
//!
//! Tracks a node from creation through its cooperative shutdown:
//! `Created -> Running -> CloseRequested -> Closed`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Node lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed by the manager, thread not yet started
    Created,
    /// Dedicated thread is executing `run`
    Running,
    /// `close()` was invoked; the node's loop will stop at its next
    /// iteration boundary
    CloseRequested,
    /// `run` returned and the thread ended (terminal)
    Closed,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NodeState::Created => "created",
            NodeState::Running => "running",
            NodeState::CloseRequested => "close-requested",
            NodeState::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Shared, atomically updated lifecycle cell
#[derive(Debug)]
pub struct StateCell(AtomicU8);

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const CLOSE_REQUESTED: u8 = 2;
const CLOSED: u8 = 3;

impl StateCell {
    /// New cell in the `Created` state
    pub fn new() -> Self {
        Self(AtomicU8::new(CREATED))
    }

    /// Current state
    pub fn get(&self) -> NodeState {
        match self.0.load(Ordering::Acquire) {
            CREATED => NodeState::Created,
            RUNNING => NodeState::Running,
            CLOSE_REQUESTED => NodeState::CloseRequested,
            _ => NodeState::Closed,
        }
    }

    /// Thread started executing `run`
    pub fn mark_running(&self) {
        let _ = self
            .0
            .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire);
    }

    /// `close()` was invoked; no effect once closed
    pub fn request_close(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state != CLOSED).then_some(CLOSE_REQUESTED)
            });
    }

    /// `run` returned; terminal
    pub fn mark_closed(&self) {
        self.0.store(CLOSED, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable cooperative cancellation flag
///
/// Set once, observed by the owning node's loop at iteration boundaries
/// (and by the server's accept loop). `set` uses Release ordering and
/// `is_set` Acquire, so everything written before the flag was raised --
/// in particular the effects of `before_close` -- is visible to any
/// thread that observes it set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// New, unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn set(&self) {
        self.inner.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), NodeState::Created);

        cell.mark_running();
        assert_eq!(cell.get(), NodeState::Running);

        cell.request_close();
        assert_eq!(cell.get(), NodeState::CloseRequested);

        cell.mark_closed();
        assert_eq!(cell.get(), NodeState::Closed);

        // Closed is terminal.
        cell.request_close();
        assert_eq!(cell.get(), NodeState::Closed);
    }

    #[test]
    fn test_close_can_precede_running() {
        let cell = StateCell::new();
        cell.request_close();
        assert_eq!(cell.get(), NodeState::CloseRequested);

        // The thread observing the flag still terminates normally.
        cell.mark_closed();
        assert_eq!(cell.get(), NodeState::Closed);
    }

    #[test]
    fn test_cancel_flag_shared_across_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_set());

        flag.set();
        assert!(other.is_set());
    }
}
