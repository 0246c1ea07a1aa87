//! Recorded steps and their CSV / JSON exports

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::client::HttpResponse;
use crate::errors::PostrunError;
use crate::models::ParameterSet;
use crate::request::RequestBody;
use crate::scripting::TestOutcome;

pub const CSV_HEADERS: [&str; 8] = ["Time", "Sequence", "Name", "Method", "URL", "Status", "Origin", "Destination"];

/// Request side of a step
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRequest {
    pub id: String,
    pub name: String,
    /// Folder path ending in the request name
    pub path: String,
    /// 1-based position in the collection
    pub index: usize,
    pub method: String,
    /// URL as written in the collection
    pub url: String,
    /// URL after variable substitution
    pub resolved_url: String,
    /// URL actually requested
    pub proxied_url: String,
    pub body: RequestBody,
}

/// One request sent for one parameter set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub parameters: ParameterSet,
    pub request: StepRequest,
    pub response: HttpResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_request: Option<TestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionStep {
    /// 2xx response and no failed test
    pub fn passed(&self) -> bool {
        self.response.is_success() && self.test_results.as_ref().is_none_or(TestOutcome::all_passed)
    }

    /// `origin-destination`
    pub fn key(&self) -> String {
        self.parameters.key()
    }

    pub fn tests_passed(&self) -> usize {
        self.test_results.as_ref().map_or(0, |t| t.passed)
    }

    pub fn tests_failed(&self) -> usize {
        self.test_results.as_ref().map_or(0, |t| t.failed)
    }
}

/// Contiguous steps sharing a parameter set
#[derive(Debug, Clone, Serialize)]
pub struct SequenceGroup<'a> {
    pub key: String,
    pub origin: &'a str,
    pub destination: &'a str,
    pub steps: Vec<&'a ExecutionStep>,
}

/// Compact per-step entry of the JSON sequence view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SequenceEntry<'a> {
    name: &'a str,
    request_index: usize,
    method: &'a str,
    url: &'a str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    timestamp: DateTime<Utc>,
    parameters: &'a ParameterSet,
}

#[derive(Debug, Serialize)]
struct SequenceGroupEntry<'a> {
    key: String,
    origin: &'a str,
    destination: &'a str,
    requests: Vec<SequenceEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonExport<'a> {
    results: &'a [ExecutionStep],
    sequence: Vec<SequenceGroupEntry<'a>>,
    timestamp: DateTime<Utc>,
}

/// Append-only record of a run
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    steps: Vec<ExecutionStep>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: ExecutionStep) {
        self.steps.push(step);
    }

    pub fn results(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Steps grouped by contiguous runs of the same parameter set
    pub fn sequence(&self) -> Vec<SequenceGroup<'_>> {
        let mut groups: Vec<SequenceGroup<'_>> = Vec::new();
        for step in &self.steps {
            let key = step.key();
            match groups.last_mut() {
                Some(group) if group.key == key => group.steps.push(step),
                _ => groups.push(SequenceGroup {
                    key,
                    origin: &step.parameters.origin,
                    destination: &step.parameters.destination,
                    steps: vec![step],
                }),
            }
        }
        groups
    }

    /// Pretty-printed `{results, sequence, timestamp}`
    pub fn to_json(&self) -> Result<String, PostrunError> {
        let sequence = self.sequence().into_iter()
            .map(|group| SequenceGroupEntry {
                key: group.key,
                origin: group.origin,
                destination: group.destination,
                requests: group.steps.into_iter()
                    .map(|step| SequenceEntry {
                        name: &step.request.name,
                        request_index: step.request.index,
                        method: &step.request.method,
                        url: &step.response.url,
                        status: step.response.status,
                        error: step.response.error.as_deref(),
                        timestamp: step.timestamp,
                        parameters: &step.parameters,
                    })
                    .collect(),
            })
            .collect();

        let export = JsonExport { results: &self.steps, sequence, timestamp: Utc::now() };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// CSV with a `NEW SEQUENCE` separator row between parameter sets
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PostrunError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(CSV_HEADERS)?;

        for (group_index, group) in self.sequence().iter().enumerate() {
            if group_index > 0 {
                let separator = format!("NEW SEQUENCE: {} → {}", group.origin, group.destination);
                let mut row = vec![separator];
                row.resize(CSV_HEADERS.len(), String::new());
                csv.write_record(&row)?;
            }

            for step in &group.steps {
                csv.write_record(csv_row(step))?;
            }
        }

        csv.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, PostrunError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| PostrunError::Report(format!("CSV is not valid UTF-8: {}", e)))
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), PostrunError> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }

    pub fn export_json(&self, path: &Path) -> Result<(), PostrunError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() { default.to_string() } else { value.to_string() }
}

fn csv_row(step: &ExecutionStep) -> [String; 8] {
    let status = match step.response.status {
        0 if step.response.error.is_some() => "Error".to_string(),
        code => code.to_string(),
    };
    let method = if step.request.method.is_empty() { "GET".to_string() } else { step.request.method.to_uppercase() };
    let url = if step.response.url.is_empty() { &step.request.proxied_url } else { &step.response.url };

    [
        step.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        step.request.index.to_string(),
        or_default(&step.request.name, "Unknown"),
        method,
        or_default(url, "N/A"),
        status,
        step.parameters.origin.clone(),
        step.parameters.destination.clone(),
    ]
}
