//! Scenario tests for the key index.
//!
//! End-to-end flows over an in-memory driver: refresh and browse, gate
//! scopes, concurrent callers and the scheduled refresher.


pub mod support;
