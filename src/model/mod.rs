// Package model provides the value types shared by the registry, loader and key cache.

pub mod db;
pub mod keys;
pub mod refresh;
pub mod server;
pub mod worker;


// Re-export main types
pub use db::{DbIndex, DB_COUNT};
pub use keys::{KeyKind, KeyRecord};
pub use refresh::{DbFailure, DbLoad, RefreshResult};
pub use server::{Secret, ServerDescriptor};
pub use worker::WorkerId;
