//! Registered backing stores and their client handles.

pub mod registry;


// Re-export main types
pub use registry::{Registry, Server};
