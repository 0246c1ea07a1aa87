//! Environment and global variable scopes

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::models::EnvironmentFile;

use super::resolver::VariableLookup;

/// Active environment plus the always-on globals
///
/// Lookup checks the environment first, then globals.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    environment: Option<EnvironmentFile>,
    globals: IndexMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_environment(mut self, environment: EnvironmentFile) -> Self {
        self.select_environment(Some(environment));
        self
    }

    pub fn with_globals(mut self, globals: IndexMap<String, String>) -> Self {
        self.globals = globals;
        self
    }

    /// Swap the active environment, returning the previous one
    pub fn select_environment(&mut self, environment: Option<EnvironmentFile>) -> Option<EnvironmentFile> {
        if let Some(env) = &environment {
            debug!(name = %env.name, id = %env.id, "Selected environment");
        }
        std::mem::replace(&mut self.environment, environment)
    }

    pub fn environment(&self) -> Option<&EnvironmentFile> {
        self.environment.as_ref()
    }

    pub fn globals(&self) -> &IndexMap<String, String> {
        &self.globals
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_environment(key).or_else(|| self.get_global(key))
    }

    pub fn get_environment(&self, key: &str) -> Option<String> {
        self.environment.as_ref()?.get(key).map(String::from)
    }

    pub fn get_global(&self, key: &str) -> Option<String> {
        self.globals.get(key).cloned()
    }

    /// Write into the active environment
    ///
    /// Returns false, and drops the write, when no environment is selected.
    pub fn set_environment(&mut self, key: &str, value: impl Into<String>) -> bool {
        match self.environment.as_mut() {
            Some(env) => {
                env.set(key, value);
                true
            }
            None => {
                warn!(key = %key, "No active environment, variable not set");
                false
            }
        }
    }

    pub fn set_global(&mut self, key: &str, value: impl Into<String>) {
        self.globals.insert(key.to_string(), value.into());
    }

    /// Every resolvable key, environment keys first
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.environment.iter()
            .flat_map(|env| env.values.iter().filter(|v| v.enabled).map(|v| v.key.clone()))
            .collect();
        for key in self.globals.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }
}

impl VariableLookup for VariableStore {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name)
    }
}
