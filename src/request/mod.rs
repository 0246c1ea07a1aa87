//! Request building module
//!
//! Turns collection request templates into requests ready for the transport.

mod builder;
pub mod proxy;

pub use builder::{PreparedRequest, RequestBody, RequestBuilder};
pub use proxy::{proxy_url, GatewaySettings};
