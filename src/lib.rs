#[path = "shared/rate/mod.rs"]
pub mod rate;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod app;
pub mod config;
pub mod conn;
pub mod db;
pub mod driver;
pub mod error;
pub mod loader;
pub mod model;
pub mod registry;
pub mod shutdown;
pub mod workers;
