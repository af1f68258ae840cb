//! Seam over the key-value client library.
//!
//! The core never speaks the wire protocol itself: a `Driver` turns a
//! `ServerDescriptor` into a `Client` handle (no network), a `Client`
//! performs handshakes, and a `Connection` answers the three calls the
//! loader needs.

pub mod redis_impl;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::DriverError;
use crate::model::{DbIndex, KeyKind, ServerDescriptor};

pub use redis_impl::RedisDriver;

/// Builds client handles for registered servers.
pub trait Driver: Send + Sync {
    /// Validates the descriptor and returns a handle. Must not touch the network.
    fn client(&self, server: &ServerDescriptor) -> Result<Arc<dyn Client>, DriverError>;
}

/// Established handle for one server.
#[async_trait]
pub trait Client: Send + Sync {
    /// Performs a handshake (including authentication) and returns a fresh connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, DriverError>;
}

/// A single connection to a backing store.
#[async_trait]
pub trait Connection: Send {
    /// Switches the connection to a logical database.
    async fn select(&mut self, db: DbIndex) -> Result<(), DriverError>;

    /// Lists every key of the selected database matching a glob pattern.
    async fn list_keys(&mut self, pattern: &str) -> Result<Vec<Vec<u8>>, DriverError>;

    /// Returns the value type of each key, in the same order.
    async fn key_types(&mut self, keys: &[Vec<u8>]) -> Result<Vec<KeyKind>, DriverError>;
}
