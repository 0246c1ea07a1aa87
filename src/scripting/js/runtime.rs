//! JavaScript runtime using QuickJS via rquickjs
//!
//! Provides the ScriptSandbox that runs collection scripts against the `pm`
//! surface built by the prelude.

use std::cell::RefCell;
use std::rc::Rc;

use rquickjs::{Context, Ctx, Runtime};
use tracing::debug;

use crate::errors::PostrunError;
use crate::scripting::context::ScriptContext;
use crate::scripting::outcome::TestOutcome;
use super::context::inject_context;
use super::modules::{self, HostState, SharedHost};

const PRELUDE: &str = include_str!("prelude.js");

/// Compiles the user script as the body of `function (pm)` and reports a
/// throw outside any test callback as a message
const RUN_SCRIPT: &str = r#"(function () {
  try {
    var body = new Function('pm', __source);
    body(pm);
    return null;
  } catch (e) {
    return __errorMessage(e);
  }
})()"#;

/// Resource limits applied to every script runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub memory_limit: usize,
    pub max_stack_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            memory_limit: 64 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

/// Runs collection scripts on QuickJS
///
/// Every execution gets its own runtime and context, so nothing declared by
/// one script is visible to the next.
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    limits: ScriptLimits,
}

impl ScriptSandbox {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    /// Run a script and collect its tests and variable writes
    ///
    /// Script failures are folded into the outcome. `Err` means the engine
    /// itself could not be set up.
    pub fn execute(&self, source: &str, context: &ScriptContext) -> Result<TestOutcome, PostrunError> {
        if source.trim().is_empty() {
            return Ok(TestOutcome::default());
        }

        let runtime = Runtime::new()
            .map_err(|e| PostrunError::Script(format!("Failed to create JS runtime: {}", e)))?;
        runtime.set_memory_limit(self.limits.memory_limit);
        runtime.set_max_stack_size(self.limits.max_stack_size);

        let js_context = Context::full(&runtime)
            .map_err(|e| PostrunError::Script(format!("Failed to create JS context: {}", e)))?;

        let host: SharedHost = Rc::new(RefCell::new(
            HostState::new(context.variables().clone())
                .with_scopes(context.environment().clone(), context.globals().clone()),
        ));

        let script_error = js_context.with(|ctx| -> Result<Option<String>, PostrunError> {
            modules::register_all(&ctx, &host)?;
            inject_context(&ctx, context)?;

            ctx.globals().set("__source", source)
                .map_err(|e| PostrunError::Script(format!("Failed to set script source: {}", e)))?;
            ctx.eval::<(), _>(PRELUDE)
                .map_err(|e| PostrunError::Script(format!("Failed to load script prelude: {}", describe_error(&ctx, e))))?;

            match ctx.eval::<Option<String>, _>(RUN_SCRIPT) {
                Ok(message) => Ok(message),
                // Uncatchable failures (out of memory, interrupted) land here
                Err(e) => Ok(Some(describe_error(&ctx, e))),
            }
        })?;

        let mut state = host.borrow_mut();
        let environment = std::mem::take(&mut state.environment);
        let globals = std::mem::take(&mut state.globals);

        let outcome = match script_error {
            Some(message) => {
                debug!(error = %message, "Script execution failed");
                TestOutcome::script_error(message, environment, globals)
            }
            None => TestOutcome::from_tests(std::mem::take(&mut state.tests), environment, globals),
        };

        Ok(outcome)
    }
}

/// Message of a pending JS exception, or the rquickjs error itself
fn describe_error(ctx: &Ctx<'_>, error: rquickjs::Error) -> String {
    if let rquickjs::Error::Exception = error {
        let value = ctx.catch();
        if let Some(message) = value.as_exception().and_then(|e| e.message()) {
            return message;
        }
        if let Some(s) = value.as_string().and_then(|s| s.to_string().ok()) {
            return s;
        }
    }
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::context::{RequestData, ResponseData};
    use crate::scripting::outcome::SCRIPT_ERROR_TEST_NAME;
    use indexmap::IndexMap;

    fn response_context(status: u16, body: &str) -> ScriptContext {
        ScriptContext::new()
            .with_request(RequestData::new("Step", "GET", "http://h/a"))
            .with_response(ResponseData::new(status, body))
    }

    #[test]
    fn test_script_without_tests() {
        let sandbox = ScriptSandbox::default();
        let outcome = sandbox.execute("var x = 1 + 1;", &response_context(200, "")).unwrap();
        assert_eq!(outcome, TestOutcome::default());
    }

    #[test]
    fn test_empty_script() {
        let outcome = ScriptSandbox::default().execute("  \n", &ScriptContext::new()).unwrap();
        assert!(outcome.tests.is_empty());
    }

    #[test]
    fn test_passing_and_failing_tests() {
        let script = r#"
            pm.test("status is 200", function () { pm.expect(pm.response.code).to.equal(200); });
            pm.test("status is 404", function () { pm.expect(pm.response.code).to.equal(404); });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &response_context(200, "")).unwrap();

        assert_eq!((outcome.passed, outcome.failed), (1, 1));
        assert!(outcome.tests[0].passed);
        assert_eq!(outcome.tests[1].error.as_deref(), Some("expected 200 to equal 404"));
    }

    #[test]
    fn test_top_level_error_replaces_tests() {
        let script = r#"
            pm.test("ok", function () {});
            undefinedFunction();
        "#;
        let outcome = ScriptSandbox::default().execute(script, &response_context(200, "")).unwrap();

        assert_eq!(outcome.tests.len(), 1);
        assert_eq!(outcome.tests[0].name, SCRIPT_ERROR_TEST_NAME);
        assert!(outcome.tests[0].error.as_deref().unwrap().contains("undefinedFunction"));
        assert_eq!((outcome.passed, outcome.failed), (0, 1));
    }

    #[test]
    fn test_syntax_error() {
        let outcome = ScriptSandbox::default().execute("const = ;", &response_context(200, "")).unwrap();
        assert_eq!(outcome.tests[0].name, SCRIPT_ERROR_TEST_NAME);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_thrown_string() {
        let outcome = ScriptSandbox::default().execute("throw 'boom';", &response_context(200, "")).unwrap();
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_response_json_fallback() {
        let script = r#"
            pm.test("empty object", function () { pm.expect(pm.response.json()).to.eql({}); });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &response_context(200, "<html>")).unwrap();
        assert!(outcome.all_passed());
    }

    #[test]
    fn test_variable_writes_captured_and_visible() {
        let script = r#"
            var data = pm.response.json();
            pm.environment.set("token", data.token);
            pm.globals.set("count", 3);
            pm.environment.set("obj", {a: 1});
            pm.test("read back", function () {
                pm.expect(pm.environment.get("token")).to.equal("abc");
                pm.expect(pm.variables.get("count")).to.equal("3");
            });
        "#;
        let outcome = ScriptSandbox::default()
            .execute(script, &response_context(200, r#"{"token": "abc"}"#))
            .unwrap();

        assert!(outcome.all_passed(), "{:?}", outcome.tests);
        assert_eq!(outcome.environment_variables[0].key, "token");
        assert_eq!(outcome.environment_variables[0].value, "abc");
        assert_eq!(outcome.environment_variables[1].value, r#"{"a":1}"#);
        assert_eq!(outcome.global_variables[0].value, "3");
    }

    #[test]
    fn test_variables_from_scope() {
        let mut vars = IndexMap::new();
        vars.insert("origin".to_string(), "10".to_string());
        let context = response_context(200, "").with_variables(vars);
        let script = r#"
            pm.test("origin", function () { pm.expect(pm.variables.get("origin")).to.equal("10"); });
            pm.test("missing", function () { pm.expect(pm.variables.get("nope")).to.be.undefined; });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &context).unwrap();
        assert!(outcome.all_passed(), "{:?}", outcome.tests);
    }

    #[test]
    fn test_environment_and_globals_read_their_own_scope() {
        let scope = |pairs: &[(&str, &str)]| -> IndexMap<String, String> {
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };
        let context = response_context(200, "")
            .with_variables(scope(&[("host", "env-host"), ("user", "bob")]))
            .with_environment(scope(&[("host", "env-host")]))
            .with_globals(scope(&[("host", "global-host"), ("user", "bob")]));
        let script = r#"
            pm.test("env", function () { pm.expect(pm.environment.get("host")).to.equal("env-host"); });
            pm.test("globals", function () { pm.expect(pm.globals.get("host")).to.equal("global-host"); });
            pm.test("global only", function () { pm.expect(pm.environment.get("user")).to.be.undefined; });
            pm.test("merged", function () { pm.expect(pm.variables.get("user")).to.equal("bob"); });
            pm.globals.set("count", 1);
            pm.test("own write", function () {
                pm.expect(pm.globals.get("count")).to.equal("1");
                pm.expect(pm.environment.get("count")).to.be.undefined;
            });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &context).unwrap();
        assert!(outcome.all_passed(), "{:?}", outcome.tests);
        assert_eq!(outcome.passed, 5);
    }

    #[test]
    fn test_request_body_raw_fallback() {
        let context = ScriptContext::new().with_request(RequestData::new("Step", "GET", "http://h/a"));
        let script = r#"
            pm.test("raw", function () { pm.expect(pm.request.body.raw).to.equal("{}"); });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &context).unwrap();
        assert!(outcome.all_passed(), "{:?}", outcome.tests);
    }

    #[test]
    fn test_postman_response_helpers() {
        let mut response = ResponseData::new(201, "{}");
        response.headers.insert("Content-Type".into(), "application/json".into());
        let context = ScriptContext::new().with_response(response);
        let script = r#"
            pm.test("status", function () { pm.response.to.have.status(201); });
            pm.test("header", function () { pm.response.to.have.header("content-type"); });
            pm.test("ok", function () { pm.response.to.be.ok; });
            pm.test("wrong", function () { pm.response.to.have.status(200); });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &context).unwrap();
        assert_eq!((outcome.passed, outcome.failed), (3, 1));
    }

    #[test]
    fn test_expect_chains() {
        let script = r#"
            pm.test("chains", function () {
                pm.expect([1, 2, 3]).to.have.lengthOf(3).and.include(2);
                pm.expect({a: 1, b: {c: 2}}).to.have.property("b").that.deep.equals({c: 2});
                pm.expect("hello world").to.be.a("string").and.match(/world$/);
                pm.expect(5).to.be.within(1, 10).and.not.equal(6);
                pm.expect({x: 1, y: 2}).to.have.keys("x", "y");
                pm.expect(null).to.be.null;
                pm.expect([]).to.be.empty;
                pm.expect(2).to.be.oneOf([1, 2]);
                pm.expect(3).to.be.above(2).and.below(4);
                pm.expect({a: [1]}).to.eql({a: [1]});
            });
        "#;
        let outcome = ScriptSandbox::default().execute(script, &response_context(200, "")).unwrap();
        assert!(outcome.all_passed(), "{:?}", outcome.tests);
    }

    #[test]
    fn test_executions_are_isolated() {
        let sandbox = ScriptSandbox::default();
        let context = response_context(200, "");
        sandbox.execute("var leaked = 1; globalThis.leaked2 = 2;", &context).unwrap();
        let outcome = sandbox.execute(
            "pm.test('isolated', function () { pm.expect(typeof leaked2).to.equal('undefined'); });",
            &context,
        ).unwrap();
        assert!(outcome.all_passed());
    }

    #[test]
    fn test_identical_runs_identical_outcomes() {
        let sandbox = ScriptSandbox::default();
        let context = response_context(404, r#"{"id": 7}"#);
        let script = r#"
            pm.environment.set("id", pm.response.json().id);
            pm.test("found", function () { pm.response.to.have.status(200); });
        "#;
        let first = sandbox.execute(script, &context).unwrap();
        let second = sandbox.execute(script, &context).unwrap();
        assert_eq!(first, second);
    }
}
