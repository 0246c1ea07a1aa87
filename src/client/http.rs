//! HTTP transport
//!
//! Sends prepared requests with reqwest. Transport failures never surface as
//! errors: they come back as a synthetic response with status 0 so the run
//! can record them like any other step.

use std::future::Future;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::errors::PostrunError;
use crate::request::{GatewaySettings, PreparedRequest, RequestBody};

pub const USER_AGENT_STRING: &str = concat!("postrun/", env!("CARGO_PKG_VERSION"));

/// Why a request produced no real response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub is_network_error: bool,
    pub is_cors_error: bool,
    pub is_timeout: bool,
}

/// Response as seen by scripts and reports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// 0 when the request never got an answer
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub body: String,
    pub response_time_ms: u64,
    pub url: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
}

impl HttpResponse {
    /// Synthetic response for a request that failed before or during sending
    pub fn failure(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
        details: ErrorDetails,
        elapsed: Duration,
    ) -> Self {
        Self {
            status: 0,
            status_text: "Error".to_string(),
            headers: IndexMap::new(),
            body: String::new(),
            response_time_ms: elapsed.as_millis() as u64,
            url: url.into(),
            method: method.into(),
            error: Some(message.into()),
            error_details: Some(details),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Body parsed as JSON
    pub fn json(&self) -> Option<JsonValue> {
        serde_json::from_str(&self.body).ok()
    }

    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Something that can deliver a prepared request
///
/// Implementations must not fail: errors are folded into the response.
pub trait Transport {
    fn send(&self, request: &PreparedRequest) -> impl Future<Output = HttpResponse> + Send;
}

/// reqwest-backed transport targeting the gateway
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    gateway: GatewaySettings,
}

impl ReqwestTransport {
    pub fn new(gateway: GatewaySettings, timeout: Option<Duration>) -> Result<Self, PostrunError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT_STRING)
            .referer(false);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self { client: builder.build()?, gateway })
    }

    fn request_builder(&self, request: &PreparedRequest, target: &str) -> Result<reqwest::RequestBuilder, String> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| format!("Invalid HTTP method: {}", request.method))?;

        let mut builder = self.client.request(method, target);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::None => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_string(value).map_err(|e| e.to_string())?),
            RequestBody::Text(text) => builder.body(text.clone()),
            RequestBody::UrlEncoded(pairs) => builder.form(pairs),
            RequestBody::FormData(pairs) => {
                let form = pairs.iter().fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                    form.text(k.clone(), v.clone())
                });
                builder.multipart(form)
            }
        };

        Ok(builder)
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &PreparedRequest) -> HttpResponse {
        let target = self.gateway.target(&request.proxied_url);
        let start = Instant::now();
        debug!(method = %request.method, target = %target, "Sending request");

        let builder = match self.request_builder(request, &target) {
            Ok(builder) => builder,
            Err(message) => {
                let details = ErrorDetails { name: "RequestError".to_string(), ..Default::default() };
                return HttpResponse::failure(&request.method, &target, message, details, start.elapsed());
            }
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(target = %target, error = %e, "Request failed");
                return HttpResponse::failure(&request.method, &target, e.to_string(), classify(&e), start.elapsed());
            }
        };

        let status = response.status();
        let url = response.url().to_string();
        let mut headers: IndexMap<String, String> = IndexMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers.entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(target = %target, error = %e, "Failed to read response body");
                return HttpResponse::failure(&request.method, &url, e.to_string(), classify(&e), start.elapsed());
            }
        };

        HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            response_time_ms: start.elapsed().as_millis() as u64,
            url,
            method: request.method.clone(),
            error: None,
            error_details: None,
        }
    }
}

fn classify(error: &reqwest::Error) -> ErrorDetails {
    let message = error.to_string();
    if error.is_timeout() {
        ErrorDetails {
            name: "TimeoutError".to_string(),
            code: Some("ECONNABORTED".to_string()),
            is_network_error: false,
            is_cors_error: false,
            is_timeout: true,
        }
    } else if error.is_connect() {
        ErrorDetails {
            name: "NetworkError".to_string(),
            code: Some("ECONNREFUSED".to_string()),
            is_network_error: true,
            is_cors_error: message.contains("CORS"),
            is_timeout: false,
        }
    } else {
        ErrorDetails {
            name: if error.is_body() || error.is_decode() { "ResponseError" } else { "RequestError" }.to_string(),
            code: None,
            is_network_error: error.is_request(),
            is_cors_error: message.contains("CORS"),
            is_timeout: false,
        }
    }
}
