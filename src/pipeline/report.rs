//! Run reports
//!
//! JUnit XML for CI systems, plus the console summary in pretty and
//! JSON-lines form.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use junit_report::{Duration, Report, TestCase, TestSuite};
use time::OffsetDateTime;

use super::results::{ExecutionStep, ResultAggregator};
use super::runner::RunSummary;
use crate::errors::PostrunError;
use crate::output::terminal;

/// Build the JUnit report: one suite per parameter group, one case per step
pub fn junit_report(results: &ResultAggregator, collection_name: &str) -> Report {
    let classname = sanitize_classname(collection_name);
    let mut report = Report::new();

    for group in results.sequence() {
        let mut suite = TestSuite::new(&format!("{} [{} → {}]", collection_name, group.origin, group.destination));
        suite.set_timestamp(OffsetDateTime::now_utc());

        for step in group.steps {
            suite.add_testcase(build_test_case(step, &classname));
        }
        report.add_testsuite(suite);
    }

    report
}

/// Write the JUnit report to any writer
pub fn write_junit<W: Write>(results: &ResultAggregator, collection_name: &str, writer: W) -> Result<(), PostrunError> {
    junit_report(results, collection_name)
        .write_xml(writer)
        .map_err(|e| PostrunError::Report(format!("Failed to write JUnit XML: {}", e)))
}

pub fn export_junit(results: &ResultAggregator, collection_name: &str, path: &Path) -> Result<(), PostrunError> {
    let file = File::create(path)?;
    write_junit(results, collection_name, file)
}

fn build_test_case(step: &ExecutionStep, classname: &str) -> TestCase {
    let duration = Duration::milliseconds(step.response.response_time_ms as i64);
    let name = format!("{}. {}", step.request.index, step.request.name);
    let target = format!("{} {}", step.request.method, step.response.url);

    let mut tc = if let Some(error) = &step.response.error {
        let message = format!("Request failed: {}\n{}", error, target);
        TestCase::error(&name, duration, "RequestError", &message)
    } else if !step.passed() {
        let mut lines: Vec<String> = step.test_results.iter()
            .flat_map(|outcome| outcome.tests.iter())
            .filter(|t| !t.passed)
            .map(|t| format!("{}: {}", t.name, t.error.as_deref().unwrap_or("failed")))
            .collect();
        if !step.response.is_success() {
            lines.insert(0, format!("Unexpected status {} {}", step.response.status, step.response.status_text));
        }
        let message = format!("{}\n\n{}", lines.join("\n"), target);
        TestCase::failure(&name, duration, "TestFailure", &message)
    } else {
        TestCase::success(&name, duration)
    };

    tc.set_classname(classname);
    tc
}

/// Sanitize a string for use as a JUnit classname
fn sanitize_classname(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// Human-readable run summary
pub fn format_run_results(steps: &[ExecutionStep], summary: &RunSummary) -> String {
    let mut output = String::new();
    output.push_str("\n═══════════════════════════════════════════════════════════════════\n");
    output.push_str("                          RUN RESULTS\n");
    output.push_str("═══════════════════════════════════════════════════════════════════\n");

    let mut current_key: Option<String> = None;
    for step in steps {
        let key = step.key();
        if current_key.as_deref() != Some(key.as_str()) {
            output.push_str(&format!(
                "\n  {} {} → {}\n",
                terminal::label("Sequence"),
                step.parameters.origin,
                step.parameters.destination
            ));
            current_key = Some(key);
        }

        let icon = if step.passed() { terminal::success("✓") } else { terminal::error("✗") };
        let status = match step.response.status {
            0 => terminal::error("ERR"),
            code => terminal::http_status(code),
        };

        output.push_str(&format!(
            "  {} {}. {} ({} {}) {}\n",
            icon,
            step.request.index,
            step.request.name,
            terminal::http_method(&step.request.method),
            status,
            terminal::muted(&format!("{}ms", step.response.response_time_ms)),
        ));

        if let Some(error) = &step.response.error {
            output.push_str(&format!("      Error: {}\n", error));
        }

        if let Some(outcome) = &step.test_results {
            for test in &outcome.tests {
                if test.passed {
                    output.push_str(&format!("      {} {}\n", terminal::success("✓"), test.name));
                } else {
                    output.push_str(&format!(
                        "      {} {}: {}\n",
                        terminal::error("✗"),
                        test.name,
                        test.error.as_deref().unwrap_or("failed")
                    ));
                }
            }
        }

        let writes: Vec<String> = step.pre_request.iter()
            .chain(step.test_results.iter())
            .flat_map(|outcome| outcome.writes())
            .map(|w| format!("{}={}", terminal::key(&w.key), w.value))
            .collect();
        if !writes.is_empty() {
            output.push_str(&format!("      Variables: {}\n", writes.join(", ")));
        }
    }

    output.push_str("\n───────────────────────────────────────────────────────────────────\n");
    output.push_str(&format!(
        "  Requests: {} | Passed: {} | Failed: {} | Tests: {}/{}\n",
        summary.steps,
        summary.passed_steps,
        summary.failed_steps,
        summary.tests_passed,
        summary.tests_passed + summary.tests_failed,
    ));
    if summary.stopped {
        output.push_str(&format!("  {}\n", terminal::warning("Run stopped before completion")));
    }
    output.push_str("═══════════════════════════════════════════════════════════════════\n");

    output
}

/// Run results as JSON lines (one line per step plus a summary line)
pub fn format_run_results_json(steps: &[ExecutionStep], summary: &RunSummary) -> String {
    let mut output = String::new();

    for step in steps {
        let writes: Vec<_> = step.pre_request.iter()
            .chain(step.test_results.iter())
            .flat_map(|outcome| outcome.writes())
            .collect();
        let json = serde_json::json!({
            "level": if step.passed() { "info" } else { "error" },
            "timestamp": step.timestamp.to_rfc3339(),
            "event": "step_result",
            "origin": step.parameters.origin,
            "destination": step.parameters.destination,
            "index": step.request.index,
            "name": step.request.name,
            "method": step.request.method,
            "url": step.response.url,
            "status_code": step.response.status,
            "duration_ms": step.response.response_time_ms,
            "passed": step.passed(),
            "error": step.response.error,
            "tests_passed": step.tests_passed(),
            "tests_failed": step.tests_failed(),
            "variables": writes,
        });
        output.push_str(&serde_json::to_string(&json).unwrap_or_default());
        output.push('\n');
    }

    let json = serde_json::json!({
        "level": "info",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "event": "run_summary",
        "total": summary.steps,
        "passed": summary.passed_steps,
        "failed": summary.failed_steps,
        "tests_passed": summary.tests_passed,
        "tests_failed": summary.tests_failed,
        "stopped": summary.stopped,
        "success": summary.all_passed(),
    });
    output.push_str(&serde_json::to_string(&json).unwrap_or_default());
    output.push('\n');

    output
}
