use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation flag shared between the caller and a running pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-run stop conditions, checked by adapters between units of work.
#[derive(Clone, Debug)]
pub struct RunContext {
    cancel: CancelHandle,
    deadline: Option<Instant>,
}

impl RunContext {
    pub fn new(cancel: CancelHandle, budget: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: budget.map(|b| Instant::now() + b),
        }
    }

    /// No budget, never cancelled unless the handle is used.
    pub fn unbounded() -> Self {
        Self::new(CancelHandle::new(), None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// True once no further external requests should start.
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }
}
