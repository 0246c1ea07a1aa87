//! Common test utilities for postrun integration tests
//!
//! - CLI invocation helpers
//! - Collection / environment / parameter fixtures written to a temp dir

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use serde_json::{json, Value};
use tempfile::TempDir;

/// Result of running the postrun binary
#[derive(Debug)]
pub struct CliResponse {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CliResponse {
    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle)
    }

    /// Parse stdout as JSON lines (`--log-format json`)
    pub fn json_lines(&self) -> Vec<Value> {
        self.stdout
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// The `run_summary` line of a JSON-lines run
    pub fn summary(&self) -> Option<Value> {
        self.json_lines().into_iter().find(|line| line["event"] == "run_summary")
    }
}

/// Scratch directory holding the files of one run
pub struct Workspace {
    pub dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self { dir: TempDir::new().expect("Failed to create temp dir") }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn path_str(&self, name: &str) -> String {
        self.path(name).to_string_lossy().to_string()
    }

    pub fn write(&self, name: &str, content: &str) -> String {
        let path = self.path(name);
        std::fs::write(&path, content).expect("Failed to write fixture");
        path.to_string_lossy().to_string()
    }

    pub fn write_json(&self, name: &str, value: &Value) -> String {
        self.write(name, &serde_json::to_string_pretty(value).expect("Failed to serialize fixture"))
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).expect("Failed to read output file")
    }

    /// Run postrun with an isolated (empty) config file
    pub fn run(&self, args: &[&str]) -> CliResponse {
        let config = self.path_str("config.toml");
        let mut full = vec!["--config", config.as_str(), "--no-progress", "--timeout", "5"];
        full.extend_from_slice(args);
        postrun(&full)
    }
}

/// Run the postrun binary with the given arguments
pub fn postrun(args: &[&str]) -> CliResponse {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_postrun"));
    cmd.args(args);
    cmd.env_remove("POSTRUN_GATEWAY");
    cmd.env_remove("POSTRUN_PREFIX");
    cmd.env("RUST_LOG", "postrun=warn");
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let output = cmd.output().expect("Failed to execute postrun");
    parse_output(output)
}

fn parse_output(output: Output) -> CliResponse {
    CliResponse {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(1),
    }
}

// ============================================================================
// Fixture builders (Postman v2.1 shapes)
// ============================================================================

pub fn collection(name: &str, items: Vec<Value>) -> Value {
    json!({
        "info": {
            "_postman_id": "4f5d1c2e-0000-4000-8000-000000000000",
            "name": name,
            "schema": "https://schema.getpostman.com/json/collection/v2.1.0/collection.json"
        },
        "item": items
    })
}

pub fn request(name: &str, method: &str, url: &str) -> Value {
    json!({
        "name": name,
        "request": {
            "method": method,
            "header": [],
            "url": { "raw": url }
        }
    })
}

pub fn with_test_script(mut item: Value, script: &str) -> Value {
    push_event(&mut item, "test", script);
    item
}

pub fn with_prerequest_script(mut item: Value, script: &str) -> Value {
    push_event(&mut item, "prerequest", script);
    item
}

pub fn with_raw_body(mut item: Value, body: &str) -> Value {
    item["request"]["body"] = json!({ "mode": "raw", "raw": body });
    item
}

pub fn with_header(mut item: Value, key: &str, value: &str) -> Value {
    if let Some(headers) = item["request"]["header"].as_array_mut() {
        headers.push(json!({ "key": key, "value": value }));
    }
    item
}

fn push_event(item: &mut Value, listen: &str, script: &str) {
    let event = json!({
        "listen": listen,
        "script": { "type": "text/javascript", "exec": script.lines().collect::<Vec<_>>() }
    });
    match item["event"].as_array_mut() {
        Some(events) => events.push(event),
        None => item["event"] = json!([event]),
    }
}

pub fn environment(values: &[(&str, &str)]) -> Value {
    let values: Vec<Value> = values
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value, "enabled": true }))
        .collect();
    json!({ "name": "test", "values": values })
}
