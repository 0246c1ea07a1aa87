//! Host bindings behind `pm`
//!
//! Registers the `__host` object. Every binding shares one [`HostState`], so
//! a `get` after a `set` in the same script sees the new value. `get` reads
//! the merged view; `envGet` and `globalGet` read one scope each.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rquickjs::{Ctx, Function, Object};

use crate::errors::PostrunError;
use crate::scripting::outcome::{TestResult, VariableWrite};

/// State recorded while one script runs
#[derive(Debug, Default)]
pub struct HostState {
    /// Script-local view of every variable
    pub variables: IndexMap<String, String>,
    /// Environment scope only, globals excluded
    pub environment_scope: IndexMap<String, String>,
    pub global_scope: IndexMap<String, String>,
    pub tests: Vec<TestResult>,
    pub environment: Vec<VariableWrite>,
    pub globals: Vec<VariableWrite>,
}

impl HostState {
    pub fn new(variables: IndexMap<String, String>) -> Self {
        Self { variables, ..Default::default() }
    }

    pub fn with_scopes(mut self, environment: IndexMap<String, String>, globals: IndexMap<String, String>) -> Self {
        self.environment_scope = environment;
        self.global_scope = globals;
        self
    }
}

pub type SharedHost = Rc<RefCell<HostState>>;

pub fn register(ctx: &Ctx<'_>, state: &SharedHost) -> Result<(), PostrunError> {
    let host = Object::new(ctx.clone())
        .map_err(|e| PostrunError::Script(format!("Failed to create host object: {}", e)))?;

    let s = state.clone();
    host.set("get", Function::new(ctx.clone(), move |key: String| -> Option<String> {
        s.borrow().variables.get(&key).cloned()
    })?)?;

    let s = state.clone();
    host.set("envGet", Function::new(ctx.clone(), move |key: String| -> Option<String> {
        s.borrow().environment_scope.get(&key).cloned()
    })?)?;

    let s = state.clone();
    host.set("globalGet", Function::new(ctx.clone(), move |key: String| -> Option<String> {
        s.borrow().global_scope.get(&key).cloned()
    })?)?;

    let s = state.clone();
    host.set("envSet", Function::new(ctx.clone(), move |key: String, value: String| {
        let mut state = s.borrow_mut();
        state.variables.insert(key.clone(), value.clone());
        state.environment_scope.insert(key.clone(), value.clone());
        state.environment.push(VariableWrite::new(key, value));
    })?)?;

    let s = state.clone();
    host.set("globalSet", Function::new(ctx.clone(), move |key: String, value: String| {
        let mut state = s.borrow_mut();
        state.variables.insert(key.clone(), value.clone());
        state.global_scope.insert(key.clone(), value.clone());
        state.globals.push(VariableWrite::new(key, value));
    })?)?;

    let s = state.clone();
    host.set("pass", Function::new(ctx.clone(), move |name: String| {
        s.borrow_mut().tests.push(TestResult::pass(name));
    })?)?;

    let s = state.clone();
    host.set("fail", Function::new(ctx.clone(), move |name: String, message: String| {
        s.borrow_mut().tests.push(TestResult::fail(name, message));
    })?)?;

    ctx.globals().set("__host", host)
        .map_err(|e| PostrunError::Script(format!("Failed to set host global: {}", e)))?;

    Ok(())
}
