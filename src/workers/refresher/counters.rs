// Package refresher provides counters for scheduled refreshes.

use std::sync::atomic::{AtomicI64, Ordering};

/// Counters for the scheduled refresher, drained by the telemetry logger.
pub struct Counters {
    /// Servers refreshed.
    pub refreshed: AtomicI64,
    /// Refreshes denied by a cooling-down gate.
    pub skipped: AtomicI64,
    /// Databases that could not be indexed.
    pub failed_dbs: AtomicI64,
    /// Keys indexed.
    pub keys: AtomicI64,
    /// Refreshes that did not run at all (server vanished mid-tick).
    pub errors: AtomicI64,
}

impl Counters {
    pub fn new() -> Self {
        Self {
            refreshed: AtomicI64::new(0),
            skipped: AtomicI64::new(0),
            failed_dbs: AtomicI64::new(0),
            keys: AtomicI64::new(0),
            errors: AtomicI64::new(0),
        }
    }

    /// Resets all counters and returns their previous values:
    /// (refreshed, skipped, failed_dbs, keys, errors).
    pub fn reset(&self) -> (i64, i64, i64, i64, i64) {
        (
            self.refreshed.swap(0, Ordering::Relaxed),
            self.skipped.swap(0, Ordering::Relaxed),
            self.failed_dbs.swap(0, Ordering::Relaxed),
            self.keys.swap(0, Ordering::Relaxed),
            self.errors.swap(0, Ordering::Relaxed),
        )
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
