//! Owner-thread bookkeeping shared by a reactor and its sockets.

use crate::error::{ReactorError, Result};
use parking_lot::RwLock;
use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use tracing::warn;

pub(crate) struct Affinity {
    reactor: String,
    owner: RwLock<ThreadId>,
    violations: AtomicU64,
}

impl Affinity {
    /// The calling thread is the first owner.
    pub(crate) fn new(reactor: impl Into<String>) -> Self {
        Self {
            reactor: reactor.into(),
            owner: RwLock::new(thread::current().id()),
            violations: AtomicU64::new(0),
        }
    }

    /// Hand ownership to the calling thread.
    pub(crate) fn claim(&self) {
        *self.owner.write() = thread::current().id();
    }

    pub(crate) fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    /// Refuse, log and count a call made off the owning thread.
    #[track_caller]
    pub(crate) fn check(&self, operation: &'static str) -> Result<()> {
        let current = thread::current();
        if *self.owner.read() == current.id() {
            return Ok(());
        }

        let location = Location::caller();
        self.violations.fetch_add(1, Ordering::Relaxed);
        warn!(
            reactor = %self.reactor,
            operation,
            %location,
            thread = current.name().unwrap_or("<unnamed>"),
            "owner-thread-only operation called from foreign thread; ignored"
        );
        Err(ReactorError::ThreadViolation {
            reactor: self.reactor.clone(),
            location,
        })
    }
}
