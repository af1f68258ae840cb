// Worker functionality for background key index maintenance.

pub mod refresher;

// Re-export main types
pub use refresher::Refresher;
