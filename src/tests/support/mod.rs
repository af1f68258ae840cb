// Shared test support code: a scriptable in-memory driver and a harness
// wiring the whole core around it.

pub mod driver;
pub mod harness;
pub mod logs;

pub use driver::MockDriver;
pub use harness::{db, TestCore};
pub use logs::CapturedLogs;
