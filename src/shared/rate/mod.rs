//! Rate limiting functionality.
//!
//! `CooldownGate` throttles whole refreshes: one permit, and after the holder
//! releases it the gate stays closed for a cooldown before reopening.
//! `Pacer` is a plain token bucket that spaces out per-database scans.

pub mod gate;
pub mod limiters;
pub mod pacer;

#[cfg(test)]
mod gate_test;
#[cfg(test)]
mod limiters_test;

// Re-export main types
pub use gate::{CooldownGate, GateState, Permit};
pub use limiters::Limiters;
pub use pacer::Pacer;
