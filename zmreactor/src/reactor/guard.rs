//! RAII guard that finishes a reactor when its loop thread leaves the loop.
//!
//! The loop can end in three ways: a stop request, a fatal callback failure
//! returned through `?`, or an unwind out of reactor code. The guard lives on
//! the loop thread's stack for the whole run, so every one of them ends in the
//! same cleanup: sockets closed, timers and pending work dropped, the context
//! released and `stop` waiters woken.
//!
//! Cleanup is idempotent; `kill` may already have run it from another thread.

use super::Shared;
use tracing::debug;

/// Runs [`Shared::finish`] when dropped.
pub(crate) struct CleanupGuard<'a> {
    shared: &'a Shared,
}

impl<'a> CleanupGuard<'a> {
    /// Arm the guard for the current loop run.
    #[inline]
    pub(crate) fn new(shared: &'a Shared) -> Self {
        Self { shared }
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            debug!(reactor = %self.shared.name, "loop thread unwinding");
        }
        self.shared.finish();
    }
}
