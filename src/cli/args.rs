//! CLI argument definitions using clap
//!
//! This module defines all command-line arguments for postrun.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use crate::models::ParameterSet;

/// postrun - run Postman collections once per origin/destination pair
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "postrun", version, about, long_about = None)]
pub struct Args {
    // =========================================================================
    // POSITIONAL ARGUMENTS
    // =========================================================================

    /// Postman collection (v2.1 JSON export)
    #[arg(value_name = "COLLECTION")]
    pub collection: PathBuf,

    // =========================================================================
    // VARIABLES
    // =========================================================================

    /// Environment file (Postman environment export)
    #[arg(short = 'e', long = "environment", value_name = "FILE")]
    pub environment: Option<PathBuf>,

    /// Global variables file (Postman globals export or a flat JSON object)
    #[arg(short = 'g', long = "globals", value_name = "FILE")]
    pub globals: Option<PathBuf>,

    // =========================================================================
    // PARAMETER SETS
    // =========================================================================

    /// Bulk parameter file: one ORIGIN;DESTINATION pair per line
    /// (separator may also be a comma, a tab or |)
    #[arg(short = 'p', long = "params", value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Parameter pair, e.g. --param 10;20 (repeatable)
    #[arg(long = "param", value_name = "ORIGIN;DEST", value_parser = parse_param)]
    pub params: Vec<ParameterSet>,

    /// Turn off the Nth parameter set, counting --params lines first, then
    /// --param flags (1-based, repeatable)
    #[arg(long = "disable-param", value_name = "N")]
    pub disable_params: Vec<usize>,

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Single-request mode: send only this request (id, name or folder path)
    #[arg(short = 'r', long = "request", value_name = "NAME", conflicts_with_all = ["only", "skip"])]
    pub request: Option<String>,

    /// Sequence mode: keep only these requests (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Sequence mode: drop these requests (repeatable)
    #[arg(long = "skip", value_name = "NAME")]
    pub skip: Vec<String>,

    // =========================================================================
    // AUTHENTICATION
    // =========================================================================

    /// Send Basic auth built from the `user` and `password` variables on every request
    #[arg(long = "global-auth", action = ArgAction::SetTrue)]
    pub global_auth: bool,

    // =========================================================================
    // GATEWAY
    // =========================================================================

    /// Gateway base URL that proxied paths are sent to
    #[arg(long = "gateway", value_name = "URL", env = "POSTRUN_GATEWAY")]
    pub gateway: Option<String>,

    /// Path prefix the gateway forwards from
    #[arg(long = "prefix", value_name = "PATH", env = "POSTRUN_PREFIX")]
    pub prefix: Option<String>,

    /// Send requests to their resolved URL instead of through the gateway
    #[arg(long = "no-gateway", action = ArgAction::SetTrue)]
    pub no_gateway: bool,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<f64>,

    // =========================================================================
    // EXPORTS
    // =========================================================================

    /// Write the results as CSV
    #[arg(long = "export-csv", value_name = "FILE")]
    pub export_csv: Option<PathBuf>,

    /// Write the results and the sequence view as JSON
    #[arg(long = "export-json", value_name = "FILE")]
    pub export_json: Option<PathBuf>,

    /// Write a JUnit XML report
    #[arg(long = "export-junit", value_name = "FILE")]
    pub export_junit: Option<PathBuf>,

    // =========================================================================
    // OUTPUT
    // =========================================================================

    /// Check every request for unresolved variables and exit
    #[arg(long = "validate", action = ArgAction::SetTrue)]
    pub validate: bool,

    /// Output format for the summary and logs: text (default) or json (JSON Lines)
    #[arg(long = "log-format", value_name = "FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Hide the progress bar
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    pub no_progress: bool,

    /// Verbose logging
    #[arg(long = "debug", action = ArgAction::SetTrue)]
    pub debug: bool,

    /// Read this config file instead of the default one
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Log format for structured output (CI/CD)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Plain text output (default)
    #[default]
    Text,
    /// JSON Lines format for parsing
    Json,
}

fn parse_param(value: &str) -> Result<ParameterSet, String> {
    ParameterSet::parse_pair(value)
}

impl Args {
    pub fn json_output(&self) -> bool {
        matches!(self.log_format, Some(LogFormat::Json))
    }
}
