//! Rebuilds the key index of a server, one logical database at a time.

pub mod loader;


// Re-export main types
pub use loader::CacheLoader;
