//! End-to-end runs against a mock gateway
//!
//! Collections point at an upstream host that is never contacted: every
//! request is rewritten under the gateway prefix and sent to the mock server.

mod common;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{collection, environment, request, with_header, with_raw_body, with_test_script, Workspace};

const UPSTREAM: &str = "http://upstream.invalid:8080";

async fn gateway() -> MockServer {
    MockServer::start().await
}

async fn received_paths(server: &MockServer) -> Vec<String> {
    server.received_requests().await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

// ============================================================================
// Sequence mode
// ============================================================================

#[tokio::test]
async fn test_sequence_runs_every_request_for_every_parameter_set() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Trips", vec![
        request("Search", "GET", &format!("{}/api/search/{{{{origin}}}}", UPSTREAM)),
        request("Quote", "GET", &format!("{}/api/quote/{{{{destination}}}}", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "--gateway", &server.uri(), "--param", "1;2", "--param", "3;4", "--log-format", "json"]);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert_eq!(received_paths(&server).await, vec![
        "/api-gateway/api/search/1",
        "/api-gateway/api/quote/2",
        "/api-gateway/api/search/3",
        "/api-gateway/api/quote/4",
    ]);
    let summary = r.summary().expect("run_summary line");
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["success"], true);
}

#[tokio::test]
async fn test_non_200_stops_only_the_current_parameter_set() {
    let server = gateway().await;
    Mock::given(path("/api-gateway/api/b/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Trips", vec![
        request("A", "GET", &format!("{}/api/a/{{{{origin}}}}", UPSTREAM)),
        request("B", "GET", &format!("{}/api/b/{{{{origin}}}}", UPSTREAM)),
        request("C", "GET", &format!("{}/api/c/{{{{origin}}}}", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "--gateway", &server.uri(), "--param", "1;2", "--param", "3;4", "--log-format", "json"]);

    assert_eq!(r.exit_code, 10, "stderr: {}", r.stderr);
    assert_eq!(received_paths(&server).await, vec![
        "/api-gateway/api/a/1",
        "/api-gateway/api/b/1",
        "/api-gateway/api/a/3",
        "/api-gateway/api/b/3",
        "/api-gateway/api/c/3",
    ]);

    let summary = r.summary().expect("run_summary line");
    assert_eq!(summary["total"], 5);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["stopped"], false);
}

#[tokio::test]
async fn test_redirect_status_also_stops_the_sequence() {
    let server = gateway().await;
    Mock::given(path("/api-gateway/api/a"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Trips", vec![
        request("A", "GET", &format!("{}/api/a", UPSTREAM)),
        request("B", "GET", &format!("{}/api/b", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "--gateway", &server.uri(), "--param", "1;2"]);

    // 201 is a success for the summary but still ends the parameter set
    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert_eq!(received_paths(&server).await, vec!["/api-gateway/api/a"]);
}

// ============================================================================
// Variables
// ============================================================================

#[tokio::test]
async fn test_token_from_test_script_reaches_later_request() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path("/api-gateway/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc123"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api-gateway/api/profile"))
        .and(header("Authorization", "Bearer abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ana"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let login = with_test_script(
        request("Login", "POST", &format!("{}/auth/login", UPSTREAM)),
        "pm.environment.set(\"token\", pm.response.json().token);",
    );
    let profile = with_header(
        request("Profile", "GET", &format!("{}/api/profile", UPSTREAM)),
        "Authorization",
        "Bearer {{token}}",
    );
    let col = ws.write_json("c.json", &collection("Auth", vec![login, profile]));

    let r = ws.run(&[&col, "--gateway", &server.uri(), "--param", "1;2"]);

    assert_eq!(r.exit_code, 0, "stdout: {}\nstderr: {}", r.stdout, r.stderr);
    assert!(r.contains("token=abc123"));
}

#[tokio::test]
async fn test_environment_values_are_substituted() {
    let server = gateway().await;
    Mock::given(method("POST"))
        .and(path("/api-gateway/v2/orders"))
        .and(query_param("tenant", "acme"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let env = ws.write_json("env.json", &environment(&[("baseUrl", UPSTREAM), ("version", "v2"), ("tenant", "acme")]));
    let item = with_raw_body(
        request("Create", "POST", "{{baseUrl}}/{{version}}/orders?tenant={{tenant}}"),
        r#"{"from": "{{origin}}", "to": "{{destination}}"}"#,
    );
    let col = ws.write_json("c.json", &collection("Orders", vec![item]));

    let r = ws.run(&[&col, "-e", &env, "--gateway", &server.uri(), "--param", "7;8"]);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body, json!({"from": "7", "to": "8"}));
}

// ============================================================================
// Gateway and auth
// ============================================================================

#[tokio::test]
async fn test_custom_prefix_keeps_query_and_marks_request() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .and(path("/gw/api/search"))
        .and(query_param("q", "1"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Search", vec![
        request("Search", "GET", &format!("{}/api/search?q={{{{origin}}}}", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "--gateway", &server.uri(), "--prefix", "gw", "--param", "1;2"]);
    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
}

#[tokio::test]
async fn test_no_gateway_sends_to_resolved_url() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .and(path("/direct"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Direct", vec![
        request("Direct", "GET", &format!("{}/direct", server.uri())),
    ]));

    let r = ws.run(&[&col, "--no-gateway", "--param", "1;2"]);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("x-requested-with"));
}

#[tokio::test]
async fn test_basic_auth_from_user_and_password_variables() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let env = ws.write_json("env.json", &environment(&[("user", "admin"), ("password", "secret")]));
    let col = ws.write_json("c.json", &collection("Secure", vec![
        request("Secure", "GET", &format!("{}/api/secure", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "-e", &env, "--gateway", &server.uri(), "--param", "1;2"]);
    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
}

#[tokio::test]
async fn test_basic_auth_from_globals_file() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Basic Ym9iOnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let globals = ws.write_json("globals.json", &json!({"user": "bob", "password": "secret"}));
    let col = ws.write_json("c.json", &collection("Secure", vec![
        request("Secure", "GET", &format!("{}/api/secure", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "-g", &globals, "--gateway", &server.uri(), "--param", "1;2"]);
    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
}

// ============================================================================
// Single mode and failures
// ============================================================================

#[tokio::test]
async fn test_single_request_mode() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Trips", vec![
        request("A", "GET", &format!("{}/api/a", UPSTREAM)),
        request("B", "GET", &format!("{}/api/b/{{{{origin}}}}", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "--gateway", &server.uri(), "-r", "B", "--param", "1;2", "--param", "3;4"]);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert_eq!(received_paths(&server).await, vec!["/api-gateway/api/b/1", "/api-gateway/api/b/3"]);
}

#[tokio::test]
async fn test_disabled_parameter_set_is_not_run() {
    let server = gateway().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Trips", vec![
        request("A", "GET", &format!("{}/api/a/{{{{origin}}}}", UPSTREAM)),
    ]));

    let r = ws.run(&[
        &col, "--gateway", &server.uri(),
        "--param", "1;2", "--param", "3;4", "--param", "5;6",
        "--disable-param", "2",
    ]);

    assert_eq!(r.exit_code, 0, "stderr: {}", r.stderr);
    assert_eq!(received_paths(&server).await, vec!["/api-gateway/api/a/1", "/api-gateway/api/a/5"]);
}

#[test]
fn test_unreachable_gateway_records_error_step() {
    let ws = Workspace::new();
    let col = ws.write_json("c.json", &collection("Down", vec![
        request("A", "GET", &format!("{}/api/a", UPSTREAM)),
        request("B", "GET", &format!("{}/api/b", UPSTREAM)),
    ]));

    let r = ws.run(&[&col, "--gateway", "http://127.0.0.1:9", "--param", "1;2", "--log-format", "json"]);

    assert_eq!(r.exit_code, 10, "stderr: {}", r.stderr);
    let lines = r.json_lines();
    let steps: Vec<_> = lines.iter().filter(|l| l["event"] == "step_result").collect();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["status_code"], 0);
    assert!(steps[0]["error"].is_string());
}
