//! JavaScript scripting support via QuickJS (rquickjs)
//!
//! Scripts run inside a fresh QuickJS runtime with a Postman-style `pm`
//! object. The object itself is plain JavaScript (`prelude.js`) layered over
//! a handful of Rust host functions.

mod runtime;
mod context;
pub mod modules;

pub use runtime::{ScriptLimits, ScriptSandbox};
pub use context::inject_context;
