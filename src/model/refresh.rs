// Package model provides the outcome of a key index refresh.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::DbIndex;
use crate::error::Error;

/// Keys indexed for one database during a refresh.
#[derive(Debug, Clone, Serialize)]
pub struct DbLoad {
    pub db: DbIndex,
    pub keys: usize,
}

/// A database the refresh could not index.
#[derive(Debug)]
pub struct DbFailure {
    pub db: DbIndex,
    pub error: Error,
}

/// Outcome of `CacheLoader::refresh_server`.
///
/// `skipped` means the rate limiter denied the refresh; it is not a failure
/// and `loaded`/`failures` are empty in that case.
#[derive(Debug)]
pub struct RefreshResult {
    pub server: String,
    pub skipped: bool,
    pub loaded: Vec<DbLoad>,
    pub failures: Vec<DbFailure>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl RefreshResult {
    pub(crate) fn started(server: &str) -> Self {
        Self {
            server: server.to_string(),
            skipped: false,
            loaded: Vec::new(),
            failures: Vec::new(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn skipped(server: &str) -> Self {
        Self {
            skipped: true,
            ..Self::started(server)
        }
    }

    /// Databases attempted, successful or not.
    pub fn attempted(&self) -> usize {
        self.loaded.len() + self.failures.len()
    }

    /// Total keys indexed across all databases.
    pub fn total_keys(&self) -> usize {
        self.loaded.iter().map(|l| l.keys).sum()
    }

    /// True when the refresh ran and every database was indexed.
    pub fn is_complete(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }

    pub fn failure(&self, db: DbIndex) -> Option<&Error> {
        self.failures.iter().find(|f| f.db == db).map(|f| &f.error)
    }

    /// JSON summary for the CLI.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "server": self.server,
            "skipped": self.skipped,
            "started_at": self.started_at.to_rfc3339(),
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "keys": self.total_keys(),
            "loaded": self.loaded,
            "failures": self.failures.iter().map(|f| serde_json::json!({
                "db": f.db,
                "error": f.error.to_string(),
            })).collect::<Vec<_>>(),
        })
    }
}
