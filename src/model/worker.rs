// Package model provides worker identities used for connection affinity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a calling worker (request handler, scheduler task).
/// Connections are cached per worker, so two workers never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Wraps an identity chosen by the caller.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a process-unique identity.
    pub fn next() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}
