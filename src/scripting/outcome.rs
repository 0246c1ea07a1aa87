//! Script execution results

use serde::{Deserialize, Serialize};

/// Name of the entry recorded when a script fails outside a test callback
pub const SCRIPT_ERROR_TEST_NAME: &str = "Script execution error";

/// One `pm.test` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    pub fn pass(name: impl Into<String>) -> Self {
        Self { name: name.into(), passed: true, error: None }
    }

    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self { name: name.into(), passed: false, error: Some(error.into()) }
    }
}

/// A variable write captured from a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableWrite {
    pub key: String,
    pub value: String,
}

impl VariableWrite {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Everything one script execution produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub tests: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub environment_variables: Vec<VariableWrite>,
    pub global_variables: Vec<VariableWrite>,
    pub script_modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    /// Outcome built from recorded tests and writes
    pub fn from_tests(
        tests: Vec<TestResult>,
        environment_variables: Vec<VariableWrite>,
        global_variables: Vec<VariableWrite>,
    ) -> Self {
        let passed = tests.iter().filter(|t| t.passed).count();
        let failed = tests.len() - passed;
        Self {
            tests,
            passed,
            failed,
            environment_variables,
            global_variables,
            script_modified: false,
            error: None,
        }
    }

    /// Outcome of a script that threw outside any test callback
    ///
    /// Tests recorded before the throw are discarded. Variable writes made
    /// before the throw are kept: they already happened.
    pub fn script_error(
        message: impl Into<String>,
        environment_variables: Vec<VariableWrite>,
        global_variables: Vec<VariableWrite>,
    ) -> Self {
        let message = message.into();
        Self {
            tests: vec![TestResult::fail(SCRIPT_ERROR_TEST_NAME, message.clone())],
            passed: 0,
            failed: 1,
            environment_variables,
            global_variables,
            script_modified: false,
            error: Some(message),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Environment then global writes, in capture order
    pub fn writes(&self) -> impl Iterator<Item = &VariableWrite> {
        self.environment_variables.iter().chain(self.global_variables.iter())
    }

    pub fn has_writes(&self) -> bool {
        !self.environment_variables.is_empty() || !self.global_variables.is_empty()
    }
}
