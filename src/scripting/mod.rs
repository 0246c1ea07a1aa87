//! Collection script support
//!
//! Pre-request and test scripts run on an embedded JavaScript engine with a
//! Postman-style `pm` object. A script never fails the caller: assertion
//! failures, syntax errors and thrown exceptions all end up in the returned
//! [`TestOutcome`].

pub mod context;
pub mod js;
pub mod outcome;
pub mod rewrite;

pub use context::{RequestData, ResponseData, ScriptContext};
pub use js::{ScriptLimits, ScriptSandbox};
pub use outcome::{TestOutcome, TestResult, VariableWrite, SCRIPT_ERROR_TEST_NAME};
pub use rewrite::{rewrite_city_declaration, Rewrite, ScriptRole};

use crate::errors::PostrunError;

/// Lifecycle hook a script is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    PreRequest,
    Test,
}

impl ScriptSandbox {
    /// Run a collection script of the given kind
    ///
    /// Test scripts get their `cidade` declaration rewritten for the current
    /// parameter set first.
    pub fn run(&self, kind: ScriptKind, source: &str, context: &ScriptContext) -> Result<TestOutcome, PostrunError> {
        match kind {
            ScriptKind::PreRequest => self.execute(source, context),
            ScriptKind::Test => {
                let lookup = |name: &str| context.variables().get(name).cloned();
                let rewrite = rewrite_city_declaration(source, context.request_name(), &lookup);
                let mut outcome = self.execute(&rewrite.script, context)?;
                outcome.script_modified = rewrite.modified;
                Ok(outcome)
            }
        }
    }
}
