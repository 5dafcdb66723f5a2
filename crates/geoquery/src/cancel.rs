//! Cooperative cancellation for search passes.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;

/// Signal that the current pass was cancelled. Not a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("search pass cancelled")]
pub struct Cancelled;

/// Result of a cancellable stage.
pub type Outcome<T> = std::result::Result<T, Cancelled>;

/// Shared cancellation flag.
///
/// Clones share the same flag, so a host thread can hold one and cancel a
/// pass that is running on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the in-flight pass.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Outcome<()> {
        if self.is_cancelled() { Err(Cancelled) } else { Ok(()) }
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let handle = CancelHandle::new();
        let remote = handle.clone();
        assert_eq!(handle.check(), Ok(()));

        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(handle.is_cancelled());
        assert_eq!(handle.check(), Err(Cancelled));

        handle.clear();
        assert!(!handle.is_cancelled());
    }
}
