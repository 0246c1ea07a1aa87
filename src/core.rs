use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use crate::cli::Args;
use crate::client::ReqwestTransport;
use crate::config::{normalize_prefix, Config};
use crate::errors::PostrunError;
use crate::logging::init_logging;
use crate::models::{load_globals, params::load_params, Collection, EnvironmentFile, ParameterList, ParameterSet};
use crate::output::{terminal, ProgressReporter};
use crate::pipeline::{
    describe_plan, export_junit, format_run_results, format_run_results_json, validate, ResultAggregator,
    RunMode, SequenceRunner,
};
use crate::request::{GatewaySettings, RequestBuilder};
use crate::scripting::ScriptSandbox;
use crate::signals;
use crate::status::ExitStatus;
use crate::variables::VariableStore;

/// Main entry point for the CLI.
///
/// Handles argument parsing, configuration loading, and runs the collection
/// on a multi-threaded tokio runtime.
pub fn run(args: Vec<String>) -> ExitStatus {
    let parsed = match Args::try_parse_from(&args) {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            return if e.kind() == clap::error::ErrorKind::DisplayHelp
                || e.kind() == clap::error::ErrorKind::DisplayVersion {
                ExitStatus::Success
            } else {
                ExitStatus::Error
            };
        }
    };

    init_logging(parsed.debug, parsed.log_format.unwrap_or_default());
    terminal::set_color_enabled(std::io::stdout().is_terminal() && !parsed.json_output());

    let loaded = match &parsed.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => return handle_error(PostrunError::Io(e), parsed.debug),
    };

    let debug = parsed.debug;
    match runtime.block_on(program(parsed, config)) {
        Ok(status) => status,
        Err(e) => handle_error(e, debug),
    }
}

pub async fn program(args: Args, config: Config) -> Result<ExitStatus, PostrunError> {
    let collection = Collection::load(&args.collection)?;
    let collection = select_requests(&collection, &args.only, &args.skip);
    let mut store = load_variables(&args)?;
    let params = load_parameters(&args)?;

    if args.validate {
        return Ok(run_validation(&collection, params.all(), &store));
    }

    let gateway = gateway_settings(&args, &config);
    let timeout = match args.timeout {
        Some(secs) if secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(_) => None,
        None => config.timeout,
    };
    let transport = ReqwestTransport::new(gateway.clone(), timeout)?;
    let builder = RequestBuilder::new(gateway, args.global_auth || config.global_auth);
    let runner = SequenceRunner::new(transport, builder, ScriptSandbox::new(config.script_limits));

    let mode = match &args.request {
        Some(name) => RunMode::Single(name.clone()),
        None => RunMode::Sequence,
    };

    info!(collection = %collection.info.name, "Running collection");
    signals::register_run(runner.control());
    let show_progress = !args.no_progress && !args.json_output() && std::io::stderr().is_terminal();
    let progress = show_progress.then(|| ProgressReporter::spawn(runner.control().subscribe()));

    let mut results = ResultAggregator::new();
    let outcome = runner.run(&mode, &collection, params.all(), &mut store, &mut results).await;

    if let Some(progress) = progress {
        progress.finish();
    }
    signals::clear_run();

    // partial results are exported even when the run failed
    if !results.is_empty() {
        write_exports(&args, &collection, &results)?;
    }
    let summary = outcome?;

    if args.json_output() {
        print!("{}", format_run_results_json(results.results(), &summary));
    } else {
        print!("{}", format_run_results(results.results(), &summary));
    }

    if signals::was_interrupted() {
        return Ok(ExitStatus::Interrupted);
    }
    Ok(ExitStatus::from_outcome(summary.all_passed()))
}

/// Apply `--only` / `--skip` (matched against id, name or path)
fn select_requests(collection: &Collection, only: &[String], skip: &[String]) -> Collection {
    if only.is_empty() && skip.is_empty() {
        return collection.clone();
    }

    collection.filtered(|request| {
        let matches = |needle: &String| {
            request.name == needle.as_str()
                || request.path == *needle
                || request.item.id.as_deref() == Some(needle.as_str())
        };
        (only.is_empty() || only.iter().any(matches)) && !skip.iter().any(matches)
    })
}

fn load_variables(args: &Args) -> Result<VariableStore, PostrunError> {
    let mut store = VariableStore::new();

    let environment = match &args.environment {
        Some(path) => {
            let environment = EnvironmentFile::load(path)?;
            info!(environment = %environment.name, values = environment.values.len(), "Loaded environment");
            environment
        }
        // script writes and parameter seeding need somewhere to land
        None => EnvironmentFile::new("postrun"),
    };
    store.select_environment(Some(environment));

    if let Some(path) = &args.globals {
        let globals = load_globals(path)?;
        info!(globals = globals.len(), "Loaded globals");
        store = store.with_globals(globals);
    }

    Ok(store)
}

fn load_parameters(args: &Args) -> Result<ParameterList, PostrunError> {
    let mut params = ParameterList::new();

    if let Some(path) = &args.params_file {
        let parsed = load_params(path)?;
        for invalid in &parsed.invalid {
            warn!(
                file = %path.display(),
                line = invalid.line,
                content = %invalid.content,
                reason = %invalid.reason,
                "Skipping invalid parameter line"
            );
        }
        params.extend(parsed.valid);
    }
    params.extend(args.params.iter().cloned());

    for &number in &args.disable_params {
        let index = number.checked_sub(1)
            .filter(|&i| i < params.len())
            .ok_or_else(|| PostrunError::Argument(format!(
                "--disable-param {}: there are {} parameter sets", number, params.len()
            )))?;
        if params.all()[index].enabled {
            params.toggle(index);
        }
    }

    if params.enabled().is_empty() {
        warn!(total = params.len(), "No enabled parameter sets; use --param ORIGIN;DEST or --params FILE");
    }
    Ok(params)
}

fn gateway_settings(args: &Args, config: &Config) -> GatewaySettings {
    let mut gateway = config.gateway.clone();
    if args.no_gateway {
        gateway.enabled = false;
    }
    if let Some(base_url) = &args.gateway {
        gateway.base_url = base_url.clone();
    }
    if let Some(prefix) = &args.prefix {
        gateway.prefix = normalize_prefix(prefix);
    }
    gateway
}

fn run_validation(collection: &Collection, params: &[ParameterSet], store: &VariableStore) -> ExitStatus {
    eprintln!("Validating collection: {}", collection.info.name);
    for line in describe_plan(&collection.requests()) {
        eprintln!("  {}", line);
    }

    match validate(collection, params, store) {
        Ok(warnings) => {
            if warnings.is_empty() {
                eprintln!("  Collection is valid");
            } else {
                eprintln!("  Collection is valid with {} warning(s):", warnings.len());
                for warning in &warnings {
                    eprintln!("    - {}", warning);
                }
            }
            ExitStatus::Success
        }
        Err(errors) => {
            eprintln!("  Validation failed with {} error(s):", errors.len());
            for error in &errors {
                eprintln!("    - {}", error);
            }
            ExitStatus::Error
        }
    }
}

fn write_exports(args: &Args, collection: &Collection, results: &ResultAggregator) -> Result<(), PostrunError> {
    if let Some(path) = &args.export_csv {
        results.export_csv(path)?;
        eprintln!("CSV written to: {}", path.display());
    }
    if let Some(path) = &args.export_json {
        results.export_json(path)?;
        eprintln!("JSON written to: {}", path.display());
    }
    if let Some(path) = &args.export_junit {
        export_junit(results, &collection.info.name, path)?;
        eprintln!("JUnit report written to: {}", path.display());
    }
    Ok(())
}

fn handle_error(error: PostrunError, debug: bool) -> ExitStatus {
    if debug {
        eprintln!("Error: {:?}", error);
    } else {
        eprintln!("Error: {}", error);
    }

    ExitStatus::Error
}
