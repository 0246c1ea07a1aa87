//! Request middleware
//!
//! Cross-cutting request decoration applied by the builder.

pub mod auth;

pub use auth::{AuthPolicy, BasicAuth};
