//! Console module for JavaScript
//!
//! Registers `__console(level, message)`; the prelude formats arguments and
//! builds `console.log/info/warn/error/debug` on top of it. Output goes to
//! tracing under the `postrun::script` target.

use rquickjs::{Ctx, Function};
use crate::errors::PostrunError;

pub fn register(ctx: &Ctx<'_>) -> Result<(), PostrunError> {
    ctx.globals().set("__console", Function::new(ctx.clone(), write)?)
        .map_err(|e| PostrunError::Script(format!("Failed to set console global: {}", e)))?;

    Ok(())
}

fn write(level: String, message: String) {
    match level.as_str() {
        "error" => tracing::error!(target: "postrun::script", "{}", message),
        "warn" => tracing::warn!(target: "postrun::script", "{}", message),
        "debug" => tracing::debug!(target: "postrun::script", "{}", message),
        _ => tracing::info!(target: "postrun::script", "{}", message),
    }
}
