//! postrun library interface
//!
//! Runs Postman-style collections once per origin/destination parameter set,
//! with collection scripts executed on an embedded JavaScript engine.
//!
//! # Module Organization
//!
//! - [`models`] - Collection, environment, globals and parameter set import
//! - [`variables`] - `{{name}}` resolution and the layered variable store
//! - [`request`] - Request assembly and the gateway URL rewrite
//! - [`middleware`] - Basic auth policy
//! - [`client`] - HTTP transport
//! - [`scripting`] - Pre-request and test scripts
//! - [`pipeline`] - Run state, runner, results and reports
//! - [`core`] - CLI execution logic

pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod scripting;
pub mod signals;
pub mod status;
pub mod variables;
