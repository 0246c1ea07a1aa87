//! Collection runs: state machine, runner, recorded results and reports

pub mod report;
pub mod results;
pub mod runner;
pub mod state;
pub mod validate;

pub use report::{export_junit, format_run_results, format_run_results_json, junit_report, write_junit};
pub use results::{ExecutionStep, ResultAggregator, SequenceGroup, StepRequest, CSV_HEADERS};
pub use runner::{RunMode, RunSummary, SequenceRunner};
pub use state::{progress_percent, Checkpoint, RunControl, RunEvent, RunState, RunStatus};
pub use validate::{describe_plan, validate};
