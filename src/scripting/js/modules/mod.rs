//! JavaScript module registrations

mod console;
pub mod host;

use rquickjs::Ctx;
use crate::errors::PostrunError;

pub use host::{HostState, SharedHost};

/// Register all host modules
pub fn register_all(ctx: &Ctx<'_>, host: &SharedHost) -> Result<(), PostrunError> {
    console::register(ctx)?;
    host::register(ctx, host)?;

    Ok(())
}
