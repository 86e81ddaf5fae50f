//! This crate contains the code required to observe a deployment run: the
//! initialization logic for logging and the global metrics registry.
pub mod config;
pub mod metrics;
pub mod panic_hook;
pub mod tracing;

pub use config::Config;
