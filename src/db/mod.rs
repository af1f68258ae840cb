//! In-memory key index: per `(server, db)` copy-on-write snapshots.

pub mod cache;
pub mod glob;


// Re-export main types
pub use cache::{CacheStats, EntryState, KeyCache};
pub use glob::glob_to_regex;
