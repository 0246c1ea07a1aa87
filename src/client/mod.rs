//! HTTP client functionality

pub mod http;

// Re-exports
pub use http::{ErrorDetails, HttpResponse, ReqwestTransport, Transport, USER_AGENT_STRING};
