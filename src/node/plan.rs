//! Cooperative loop helper
//!
//! Node authors express their `run` iteration through a [`LoopPlan`]: a
//! builder that accepts exactly one of three mutually exclusive
//! termination modes -- a fixed iteration count, a finite sequence of
//! items, or a boolean condition re-evaluated before every pass. The plan
//! invokes the per-iteration body once per pass and checks the node's
//! cancellation flag after every iteration, returning immediately when it
//! is set. Selecting more than one mode, or none, is a caller error.

use crate::error::{NodeError, Result};
use crate::node::state::CancelFlag;

/// Body verdict for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopFlow {
    /// Proceed to the next pass
    Continue,
    /// End the loop as a normal termination
    Break,
}

/// Context handed to the per-iteration body
#[derive(Debug)]
pub struct Step<T> {
    /// Zero-based pass number
    pub index: usize,
    /// The sequence item for this pass (sequence mode only)
    pub item: Option<T>,
}

/// One-of-three termination-mode loop builder
///
/// ```
/// use wirebus::node::{CancelFlag, LoopFlow, LoopPlan};
///
/// let cancel = CancelFlag::new();
/// let mut passes = 0;
/// LoopPlan::<()>::new()
///     .count(3)
///     .run(&cancel, |_step| {
///         passes += 1;
///         Ok(LoopFlow::Continue)
///     })
///     .unwrap();
/// assert_eq!(passes, 3);
/// ```
pub struct LoopPlan<T = ()> {
    count: Option<usize>,
    items: Option<Vec<T>>,
    condition: Option<Box<dyn FnMut() -> bool + Send>>,
}

impl<T> LoopPlan<T> {
    /// Empty plan; a termination mode must be selected before `run`
    pub fn new() -> Self {
        Self {
            count: None,
            items: None,
            condition: None,
        }
    }

    /// Fixed-count mode: run the body `n` times
    pub fn count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    /// Sequence mode: run the body once per item
    pub fn over(mut self, items: Vec<T>) -> Self {
        self.items = Some(items);
        self
    }

    /// Condition mode: run the body while `condition` holds, re-evaluated
    /// before every pass
    pub fn while_true(mut self, condition: impl FnMut() -> bool + Send + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    /// Execute the plan
    ///
    /// Validates that exactly one termination mode was selected
    /// ([`NodeError::LoopModeSelection`] otherwise), then iterates. The
    /// cancellation flag is checked after every pass; when set, the loop
    /// returns `Ok` at that boundary. The body may end the loop early by
    /// returning [`LoopFlow::Break`], or abort it by returning an error.
    pub fn run<F>(self, cancel: &CancelFlag, mut body: F) -> Result<()>
    where
        F: FnMut(Step<T>) -> Result<LoopFlow>,
    {
        let selected = self.count.is_some() as usize
            + self.items.is_some() as usize
            + self.condition.is_some() as usize;
        if selected != 1 {
            return Err(NodeError::LoopModeSelection(selected).into());
        }

        if let Some(n) = self.count {
            for index in 0..n {
                if pass(&mut body, Step { index, item: None })? || cancel.is_set() {
                    return Ok(());
                }
            }
        } else if let Some(items) = self.items {
            for (index, item) in items.into_iter().enumerate() {
                let step = Step {
                    index,
                    item: Some(item),
                };
                if pass(&mut body, step)? || cancel.is_set() {
                    return Ok(());
                }
            }
        } else if let Some(mut condition) = self.condition {
            let mut index = 0;
            while condition() {
                if pass(&mut body, Step { index, item: None })? || cancel.is_set() {
                    return Ok(());
                }
                index += 1;
            }
        }

        Ok(())
    }
}

impl<T> Default for LoopPlan<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn pass<T, F>(body: &mut F, step: Step<T>) -> Result<bool>
where
    F: FnMut(Step<T>) -> Result<LoopFlow>,
{
    Ok(body(step)? == LoopFlow::Break)
}
