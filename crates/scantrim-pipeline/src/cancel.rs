//! Cooperative cancellation.
//!
//! A run shares one [`CancellationToken`] across every task. Tasks and
//! analyzers only read it, through the [`TaskStatus`] trait, at well
//! defined points. Observing a request turns into [`Cancelled`], which
//! callers propagate with `?` instead of producing a value.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The unit of work was abandoned because cancellation was requested.
///
/// This is a control-flow outcome, not a failure: nothing past the last
/// committed write was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task was cancelled")]
pub struct Cancelled;

/// Read-only view of a run's cancellation state.
pub trait TaskStatus: Send + Sync {
    /// Whether cancellation has been requested.
    fn is_cancelled(&self) -> bool;

    /// Return `Err(Cancelled)` once cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if [`is_cancelled`](Self::is_cancelled).
    fn throw_if_cancelled(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A fresh, not-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl TaskStatus for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Status that never requests cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl TaskStatus for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}
