//! Configuration file support

#[allow(clippy::module_inception)]
mod config;

pub use config::{normalize_prefix, Config};
