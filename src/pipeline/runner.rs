//! Collection execution engine
//!
//! Sends collection requests once per parameter set, running pre-request and
//! test scripts around each one and carrying script writes forward to the
//! following steps.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::client::{ErrorDetails, HttpResponse, Transport};
use crate::errors::PostrunError;
use crate::models::{Collection, FlatRequest, Listen, ParameterSet};
use crate::request::{PreparedRequest, RequestBody, RequestBuilder};
use crate::scripting::{RequestData, ResponseData, ScriptContext, ScriptKind, ScriptSandbox, TestOutcome};
use crate::variables::{CarriedVariables, RunScope, VariableStore};
use super::results::{ExecutionStep, ResultAggregator, StepRequest};
use super::state::{Checkpoint, RunControl, RunEvent, RunState};

/// How a run walks the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// One named request per parameter set
    Single(String),
    /// Every request per parameter set, stopping a set at the first non-200
    Sequence,
}

/// Totals for a finished (or stopped) run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    /// Stopped before all work was done
    pub stopped: bool,
}

impl RunSummary {
    pub fn from_steps(steps: &[ExecutionStep], stopped: bool) -> Self {
        let passed_steps = steps.iter().filter(|s| s.passed()).count();
        Self {
            steps: steps.len(),
            passed_steps,
            failed_steps: steps.len() - passed_steps,
            tests_passed: steps.iter().map(ExecutionStep::tests_passed).sum(),
            tests_failed: steps.iter().map(ExecutionStep::tests_failed).sum(),
            stopped,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed_steps == 0
    }
}

/// Runs collections against a transport
pub struct SequenceRunner<T: Transport> {
    transport: T,
    builder: RequestBuilder,
    sandbox: ScriptSandbox,
    control: RunControl,
}

impl<T: Transport> SequenceRunner<T> {
    pub fn new(transport: T, builder: RequestBuilder, sandbox: ScriptSandbox) -> Self {
        Self { transport, builder, sandbox, control: RunControl::new() }
    }

    /// Handle for pausing, resuming and stopping from other tasks
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    pub fn state(&self) -> RunState {
        self.control.state()
    }

    /// Run the collection in the given mode
    pub async fn run(
        &self,
        mode: &RunMode,
        collection: &Collection,
        params: &[ParameterSet],
        store: &mut VariableStore,
        results: &mut ResultAggregator,
    ) -> Result<RunSummary, PostrunError> {
        match mode {
            RunMode::Single(needle) => self.run_single(collection, needle, params, store, results).await,
            RunMode::Sequence => self.run_sequence(collection, params, store, results).await,
        }
    }

    /// Send one request once per enabled parameter set
    pub async fn run_single(
        &self,
        collection: &Collection,
        needle: &str,
        params: &[ParameterSet],
        store: &mut VariableStore,
        results: &mut ResultAggregator,
    ) -> Result<RunSummary, PostrunError> {
        let request = collection.find_request(needle)
            .ok_or_else(|| PostrunError::Argument(format!("Request not found in collection: {}", needle)))?;
        let enabled = enabled_params(params)?;

        let first = results.len();
        self.begin(enabled.len())?;
        info!(request = %request.name, params = enabled.len(), "Starting single request run");

        let mut carried = CarriedVariables::new();
        let mut stopped = false;

        for param in &enabled {
            if self.control.checkpoint().await == Checkpoint::Stop {
                stopped = true;
                break;
            }

            seed_parameters(store, param);
            let step = self.step_or_fail(&request, param, store, &mut carried).await?;
            results.record(step);
            self.control.advance();
        }

        self.finish(&results.results()[first..], stopped).await
    }

    /// Send every request for every enabled parameter set
    ///
    /// A response other than 200 abandons the rest of the current parameter
    /// set; the next set starts from the first request again.
    pub async fn run_sequence(
        &self,
        collection: &Collection,
        params: &[ParameterSet],
        store: &mut VariableStore,
        results: &mut ResultAggregator,
    ) -> Result<RunSummary, PostrunError> {
        let requests = collection.requests();
        if requests.is_empty() {
            return Err(PostrunError::Argument("Collection has no requests to run".to_string()));
        }
        let enabled = enabled_params(params)?;

        let first = results.len();
        self.begin(enabled.len() * requests.len())?;
        info!(
            requests = requests.len(),
            params = enabled.len(),
            "Starting sequence run"
        );

        let mut carried = CarriedVariables::new();
        let mut stopped = false;

        'params: for (param_index, param) in enabled.iter().enumerate() {
            if self.control.checkpoint().await == Checkpoint::Stop {
                stopped = true;
                break;
            }

            info!(origin = %param.origin, destination = %param.destination, "Starting parameter set");
            seed_parameters(store, param);

            for request in &requests {
                if self.control.checkpoint().await == Checkpoint::Stop {
                    stopped = true;
                    break 'params;
                }

                let step = self.step_or_fail(request, param, store, &mut carried).await?;
                let status = step.response.status;
                results.record(step);
                self.control.advance();

                if status != 200 {
                    warn!(
                        request = %request.name,
                        index = request.index,
                        status,
                        "Request did not return 200, stopping sequence"
                    );
                    break;
                }
            }

            self.control.advance_to((param_index + 1) * requests.len());
        }

        self.finish(&results.results()[first..], stopped).await
    }

    fn begin(&self, total: usize) -> Result<(), PostrunError> {
        if !self.control.start(total) {
            return Err(PostrunError::Pipeline("A run is already in progress".to_string()));
        }
        Ok(())
    }

    async fn finish(&self, steps: &[ExecutionStep], mut stopped: bool) -> Result<RunSummary, PostrunError> {
        // a pause requested during the last step still holds completion
        if !stopped && self.control.checkpoint().await == Checkpoint::Stop {
            stopped = true;
        }
        if !stopped {
            self.control.apply(RunEvent::Finish);
        }

        let summary = RunSummary::from_steps(steps, stopped);
        info!(
            steps = summary.steps,
            passed = summary.passed_steps,
            failed = summary.failed_steps,
            stopped,
            "Run finished"
        );
        Ok(summary)
    }

    /// Execute a step, moving the run to `Failed` if it cannot be executed
    async fn step_or_fail(
        &self,
        request: &FlatRequest<'_>,
        param: &ParameterSet,
        store: &mut VariableStore,
        carried: &mut CarriedVariables,
    ) -> Result<ExecutionStep, PostrunError> {
        match self.execute_step(request, param, store, carried).await {
            Ok(step) => Ok(step),
            Err(e) => {
                self.control.apply(RunEvent::Fail(e.to_string()));
                Err(e)
            }
        }
    }

    /// Pre-request script, build, send, test script
    pub async fn execute_step(
        &self,
        request: &FlatRequest<'_>,
        param: &ParameterSet,
        store: &mut VariableStore,
        carried: &mut CarriedVariables,
    ) -> Result<ExecutionStep, PostrunError> {
        let template = request.request;
        let url_template = template.url.as_ref().and_then(|u| u.template()).unwrap_or_default();

        let pre_request = match request.item.script(Listen::Prerequest) {
            Some(source) => {
                let context = script_scope(
                    ScriptContext::new().with_request(RequestData::new(request.name, &template.method, &url_template)),
                    &RunScope::new(carried, Some(param), store),
                );
                let outcome = self.sandbox.run(ScriptKind::PreRequest, &source, &context)?;
                if let Some(error) = &outcome.error {
                    warn!(request = %request.name, error = %error, "Pre-request script failed");
                }
                apply_writes(&outcome, store, carried);
                Some(outcome)
            }
            None => None,
        };

        let built = self.builder.build(template, &RunScope::new(carried, Some(param), store));
        let (prepared, response) = match built {
            Ok(prepared) => {
                let response = self.transport.send(&prepared).await;
                (Some(prepared), response)
            }
            Err(e) => {
                warn!(request = %request.name, error = %e, "Could not build request");
                let details = ErrorDetails { name: "RequestError".to_string(), ..Default::default() };
                let response = HttpResponse::failure(template.method.to_uppercase(), "", e.to_string(), details, Duration::ZERO);
                (None, response)
            }
        };
        debug!(request = %request.name, status = response.status, time_ms = response.response_time_ms, "Response received");

        let test_results = match request.item.script(Listen::Test) {
            Some(source) if !response.is_error() => {
                let request_data = match &prepared {
                    Some(prepared) => RequestData::from_prepared(request.name, prepared),
                    None => RequestData::new(request.name, &template.method, &url_template),
                };
                let context = script_scope(
                    ScriptContext::new().with_request(request_data).with_response(ResponseData::from(&response)),
                    &RunScope::new(carried, Some(param), store),
                );
                let outcome = self.sandbox.run(ScriptKind::Test, &source, &context)?;
                log_outcome(request.name, &outcome);
                apply_writes(&outcome, store, carried);
                Some(outcome)
            }
            _ => None,
        };

        Ok(ExecutionStep {
            parameters: param.clone(),
            request: step_request(request, &url_template, prepared),
            response,
            pre_request,
            test_results,
            timestamp: Utc::now(),
        })
    }
}

fn enabled_params(params: &[ParameterSet]) -> Result<Vec<ParameterSet>, PostrunError> {
    let enabled: Vec<ParameterSet> = params.iter().filter(|p| p.enabled).cloned().collect();
    if enabled.is_empty() {
        return Err(PostrunError::Argument("No enabled parameter sets to run".to_string()));
    }
    Ok(enabled)
}

/// Expose the current parameter set through the environment
fn seed_parameters(store: &mut VariableStore, param: &ParameterSet) {
    for (key, value) in [
        ("origin", &param.origin),
        ("originName", &param.origin),
        ("destination", &param.destination),
        ("destinationName", &param.destination),
    ] {
        store.set_environment(key, value.as_str());
    }
}

/// Apply captured script writes to the store and carry them to later steps
fn script_scope(context: ScriptContext, scope: &RunScope<'_>) -> ScriptContext {
    context
        .with_variables(scope.snapshot())
        .with_environment(scope.environment_snapshot())
        .with_globals(scope.store.globals().clone())
}

fn apply_writes(outcome: &TestOutcome, store: &mut VariableStore, carried: &mut CarriedVariables) {
    for write in &outcome.environment_variables {
        store.set_environment(&write.key, write.value.as_str());
        carried.insert(write.key.as_str(), write.value.as_str());
    }
    for write in &outcome.global_variables {
        store.set_global(&write.key, write.value.as_str());
        carried.insert(write.key.as_str(), write.value.as_str());
    }
    if outcome.has_writes() {
        let keys: Vec<&str> = outcome.writes().map(|w| w.key.as_str()).collect();
        debug!(keys = ?keys, "Applied script variables");
    }
}

fn log_outcome(name: &str, outcome: &TestOutcome) {
    let total = outcome.passed + outcome.failed;
    if outcome.failed > 0 {
        warn!(request = %name, passed = outcome.passed, total, "Tests failed");
    } else if total > 0 {
        debug!(request = %name, passed = outcome.passed, total, "Tests passed");
    }
}

fn step_request(request: &FlatRequest<'_>, url_template: &str, prepared: Option<PreparedRequest>) -> StepRequest {
    let (method, resolved_url, proxied_url, body) = match prepared {
        Some(p) => (p.method, p.url, p.proxied_url, p.body),
        None => (request.request.method.to_uppercase(), String::new(), String::new(), RequestBody::None),
    };

    StepRequest {
        id: request.id.clone(),
        name: request.name.to_string(),
        path: request.path.clone(),
        index: request.index,
        method,
        url: url_template.to_string(),
        resolved_url,
        proxied_url,
        body,
    }
}
