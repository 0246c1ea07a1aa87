//! Run-scoped variable layers

use indexmap::IndexMap;

use crate::models::ParameterSet;

use super::resolver::VariableLookup;
use super::store::VariableStore;

/// Variables written by scripts during one run
///
/// Owned by a single run invocation; later steps see earlier writes before
/// any other scope.
#[derive(Debug, Clone, Default)]
pub struct CarriedVariables {
    values: IndexMap<String, String>,
}

impl CarriedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lookup used while a run is in progress
///
/// Precedence: carried variables, then the current parameter set (`origin`,
/// `destination`, `originName`, `destinationName`), then the store.
#[derive(Debug, Clone, Copy)]
pub struct RunScope<'a> {
    pub carried: &'a CarriedVariables,
    pub params: Option<&'a ParameterSet>,
    pub store: &'a VariableStore,
}

impl<'a> RunScope<'a> {
    pub fn new(carried: &'a CarriedVariables, params: Option<&'a ParameterSet>, store: &'a VariableStore) -> Self {
        Self { carried, params, store }
    }

    fn parameter(&self, name: &str) -> Option<String> {
        let params = self.params?;
        match name {
            "origin" | "originName" => Some(params.origin.clone()),
            "destination" | "destinationName" => Some(params.destination.clone()),
            _ => None,
        }
    }

    /// Every key visible through this scope with its effective value
    pub fn snapshot(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        for key in self.store.keys() {
            if let Some(value) = self.lookup(&key) {
                out.insert(key, value);
            }
        }
        for name in ["origin", "destination", "originName", "destinationName"] {
            if let Some(value) = self.lookup(name) {
                out.insert(name.to_string(), value);
            }
        }
        for (key, value) in self.carried.iter() {
            out.insert(key.clone(), value.clone());
        }
        out
    }

    /// Like [`snapshot`](Self::snapshot) without the globals fallback
    ///
    /// Carried variables stay in: they are run-wide whichever scope wrote them.
    pub fn environment_snapshot(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        if let Some(env) = self.store.environment() {
            for value in env.values.iter().filter(|v| v.enabled) {
                if let Some(effective) = self.lookup_environment(&value.key) {
                    out.insert(value.key.clone(), effective);
                }
            }
        }
        for name in ["origin", "destination", "originName", "destinationName"] {
            if let Some(value) = self.lookup_environment(name) {
                out.insert(name.to_string(), value);
            }
        }
        for (key, value) in self.carried.iter() {
            out.insert(key.clone(), value.clone());
        }
        out
    }

    fn lookup_environment(&self, name: &str) -> Option<String> {
        self.carried.get(name).map(String::from)
            .or_else(|| self.parameter(name))
            .or_else(|| self.store.get_environment(name))
    }
}

impl VariableLookup for RunScope<'_> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.carried.get(name).map(String::from)
            .or_else(|| self.parameter(name))
            .or_else(|| self.store.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnvironmentFile;
    use crate::variables::resolve;

    #[test]
    fn test_precedence() {
        let store = VariableStore::new().with_environment(
            EnvironmentFile::new("dev")
                .with_value("origin", "env-origin")
                .with_value("token", "env-token")
                .with_value("base", "http://api"),
        );
        let params = ParameterSet::new("10", "20");
        let mut carried = CarriedVariables::new();
        carried.insert("token", "carried-token");

        let scope = RunScope::new(&carried, Some(&params), &store);
        assert_eq!(scope.lookup("token").as_deref(), Some("carried-token"));
        assert_eq!(scope.lookup("origin").as_deref(), Some("10"));
        assert_eq!(scope.lookup("destinationName").as_deref(), Some("20"));
        assert_eq!(scope.lookup("base").as_deref(), Some("http://api"));
        assert_eq!(resolve("{{base}}/{{origin}}/{{destination}}", &scope), "http://api/10/20");
    }

    #[test]
    fn test_without_params_falls_back_to_store() {
        let store = VariableStore::new().with_environment(EnvironmentFile::new("dev").with_value("origin", "5"));
        let carried = CarriedVariables::new();
        let scope = RunScope::new(&carried, None, &store);
        assert_eq!(scope.lookup("origin").as_deref(), Some("5"));
        assert_eq!(scope.lookup("destination"), None);
    }

    #[test]
    fn test_environment_snapshot_leaves_out_globals() {
        let mut globals = IndexMap::new();
        globals.insert("host".to_string(), "global-host".to_string());
        globals.insert("user".to_string(), "bob".to_string());
        let store = VariableStore::new()
            .with_environment(EnvironmentFile::new("dev").with_value("host", "env-host"))
            .with_globals(globals);
        let carried = CarriedVariables::new();
        let params = ParameterSet::new("1", "2");
        let scope = RunScope::new(&carried, Some(&params), &store);

        let env = scope.environment_snapshot();
        assert_eq!(env["host"], "env-host");
        assert_eq!(env["origin"], "1");
        assert!(!env.contains_key("user"));
        assert_eq!(scope.snapshot()["user"], "bob");
    }

    #[test]
    fn test_snapshot_applies_precedence() {
        let store = VariableStore::new().with_environment(EnvironmentFile::new("dev").with_value("a", "env"));
        let mut carried = CarriedVariables::new();
        carried.insert("a", "carried");
        carried.insert("b", "new");
        let params = ParameterSet::new("1", "2");

        let snapshot = RunScope::new(&carried, Some(&params), &store).snapshot();
        assert_eq!(snapshot["a"], "carried");
        assert_eq!(snapshot["b"], "new");
        assert_eq!(snapshot["originName"], "1");
    }
}
