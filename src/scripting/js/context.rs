//! JavaScript context bridge
//!
//! Injects ScriptContext data (request, response) into the JavaScript global
//! scope as `__request` and `__response` for the prelude to wrap.

use indexmap::IndexMap;
use rquickjs::{Ctx, Object};

use crate::errors::PostrunError;
use crate::scripting::context::ScriptContext;

/// Inject script context into JavaScript globals
pub fn inject_context(ctx: &Ctx<'_>, context: &ScriptContext) -> Result<(), PostrunError> {
    let globals = ctx.globals();

    if let Some(req) = context.request() {
        let request_obj = Object::new(ctx.clone())
            .map_err(|e| PostrunError::Script(format!("Failed to create request object: {}", e)))?;

        request_obj.set("name", req.name.as_str())
            .map_err(|e| PostrunError::Script(format!("Failed to set name: {}", e)))?;
        request_obj.set("method", req.method.as_str())
            .map_err(|e| PostrunError::Script(format!("Failed to set method: {}", e)))?;
        request_obj.set("url", req.url.as_str())
            .map_err(|e| PostrunError::Script(format!("Failed to set url: {}", e)))?;

        let headers_obj = map_to_js_object(ctx, &req.headers)?;
        request_obj.set("headers", headers_obj)
            .map_err(|e| PostrunError::Script(format!("Failed to set headers: {}", e)))?;

        if let Some(body) = &req.body_raw {
            request_obj.set("body", body.as_str())
                .map_err(|e| PostrunError::Script(format!("Failed to set body: {}", e)))?;
        }

        globals.set("__request", request_obj)
            .map_err(|e| PostrunError::Script(format!("Failed to set request global: {}", e)))?;
    }

    if let Some(resp) = context.response() {
        let response_obj = Object::new(ctx.clone())
            .map_err(|e| PostrunError::Script(format!("Failed to create response object: {}", e)))?;

        response_obj.set("status", resp.status as i32)
            .map_err(|e| PostrunError::Script(format!("Failed to set status: {}", e)))?;
        response_obj.set("statusText", resp.status_text.as_str())
            .map_err(|e| PostrunError::Script(format!("Failed to set statusText: {}", e)))?;

        let headers_obj = map_to_js_object(ctx, &resp.headers)?;
        response_obj.set("headers", headers_obj)
            .map_err(|e| PostrunError::Script(format!("Failed to set headers: {}", e)))?;

        response_obj.set("body", resp.body.as_str())
            .map_err(|e| PostrunError::Script(format!("Failed to set body: {}", e)))?;
        response_obj.set("responseTime", resp.response_time_ms as f64)
            .map_err(|e| PostrunError::Script(format!("Failed to set responseTime: {}", e)))?;

        globals.set("__response", response_obj)
            .map_err(|e| PostrunError::Script(format!("Failed to set response global: {}", e)))?;
    }

    Ok(())
}

/// Convert a string map to a JavaScript object
fn map_to_js_object<'js>(ctx: &Ctx<'js>, map: &IndexMap<String, String>) -> Result<Object<'js>, PostrunError> {
    let obj = Object::new(ctx.clone())
        .map_err(|e| PostrunError::Script(format!("Failed to create object: {}", e)))?;

    for (key, value) in map {
        obj.set(key.as_str(), value.as_str())
            .map_err(|e| PostrunError::Script(format!("Failed to set {}: {}", key, e)))?;
    }

    Ok(obj)
}
