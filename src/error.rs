// Package error provides the error kinds of the key index core.

use std::time::Duration;

use crate::model::{DbIndex, WorkerId};

/// Failure reported by a key-value driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Backend(String),
}

/// Errors surfaced by the registry, connection provider and loader.
///
/// Refresh throttling is not an error; see `RefreshResult::skipped`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad registration input. Fatal to that registration only.
    #[error("invalid configuration for server {server:?}: {reason}")]
    Configuration { server: String, reason: String },

    #[error("server {0:?} is not registered")]
    NotFound(String),

    /// Handshake or network failure. Never retried inside the core.
    #[error("connection to {server} ({db}) failed: {source}")]
    Connection {
        server: String,
        db: DbIndex,
        #[source]
        source: DriverError,
    },

    /// Listing keys for one database failed. Sibling databases still run.
    #[error("enumerating keys of {server}/{db} failed: {source}")]
    Enumeration {
        server: String,
        db: DbIndex,
        #[source]
        source: DriverError,
    },

    #[error("worker {worker} has no connection to {server}/{db}")]
    ConnectionMissing {
        worker: WorkerId,
        server: String,
        db: DbIndex,
    },

    #[error("database index {0} is out of range 0..16")]
    InvalidDatabase(u32),
}

impl Error {
    pub(crate) fn configuration(server: &str, reason: impl Into<String>) -> Self {
        Error::Configuration {
            server: server.to_string(),
            reason: reason.into(),
        }
    }
}
