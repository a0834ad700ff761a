//! # Delayed Tasks
//!
//! A cancellable "run this after a delay" primitive, and the per-tab
//! debouncer built on it.
//!
//! ## Debounce Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  mutation   mutation        mutation                                    │
//! │     │          │               │                                        │
//! │     ▼          ▼               ▼                                        │
//! │     ├──────X   ├─────────X     ├───────────────────┤ fire (confirm)     │
//! │     (cancelled)(cancelled)      └── quiet period ──┘                    │
//! │                                                                         │
//! │  At most one armed task per Debouncer: the old one is cancelled before  │
//! │  the new one is spawned.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancellation only stops a task that is still waiting. Once the delay has
//! elapsed the action runs to completion.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Delayed Task
// =============================================================================

/// An action scheduled to run after a delay unless cancelled first.
///
/// Dropping the task cancels it.
#[derive(Debug)]
pub struct DelayedTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl DelayedTask {
    /// Spawns `action` to run after `delay` on the current runtime.
    pub fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => action.await,
            }
        });

        DelayedTask { token, handle }
    }

    /// Stops the task if it has not fired yet.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the task either fired and completed or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// =============================================================================
// Debouncer
// =============================================================================

/// Holds at most one pending [`DelayedTask`].
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Option<DelayedTask>,
}

impl Debouncer {
    pub fn new() -> Self {
        Debouncer { pending: None }
    }

    /// Cancels any pending task and arms a new one.
    pub fn reschedule<F>(&mut self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(DelayedTask::schedule(delay, action));
    }

    /// Cancels the pending task, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
    }

    /// True while a task is armed and has not fired.
    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .map(|t| !t.is_cancelled() && !t.is_finished())
            .unwrap_or(false)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
