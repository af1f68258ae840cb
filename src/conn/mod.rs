//! Worker-affine connections to registered servers.

pub mod provider;


// Re-export main types
pub use provider::{ConnectionProvider, SharedConnection};
