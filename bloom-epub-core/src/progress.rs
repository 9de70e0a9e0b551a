//! Progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for a staging run.
///
/// Cloning shares the underlying flag, so a UI thread can hold one clone and
/// set it while the worker polls another between pages.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current run stop at its next checkpoint
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receiver of user-visible progress messages
pub trait ProgressSink: Send + Sync {
    fn message(&self, text: &str);
}

/// Progress sink that forwards messages to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn message(&self, text: &str) {
        tracing::info!("{}", text);
    }
}

/// Progress sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn message(&self, _text: &str) {}
}
