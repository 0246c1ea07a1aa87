//! Variable resolution
//!
//! Templates reference variables as `{{name}}`. Values come from layered
//! scopes: run-carried script writes, the current parameter set, the active
//! environment and globals.

pub mod resolver;
pub mod scope;
pub mod store;

pub use resolver::{find_variables, resolve, VariableLookup};
pub use scope::{CarriedVariables, RunScope};
pub use store::VariableStore;
