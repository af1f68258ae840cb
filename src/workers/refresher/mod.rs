//! Scheduled refresh worker.

pub mod counters;
pub mod refresher;
pub mod telemetry;

// Re-export main types
pub use refresher::Refresher;
