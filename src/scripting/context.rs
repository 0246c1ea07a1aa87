//! Script execution context
//!
//! What a script can see: the request, the response (test scripts only), a
//! flattened view of every variable in scope, and the environment and global
//! scopes on their own.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::client::HttpResponse;
use crate::request::{PreparedRequest, RequestBody};

/// Request data available to scripts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestData {
    pub name: String,
    pub method: String,
    pub url: String,
    pub headers: IndexMap<String, String>,
    /// Body as text; `None` for bodies without a textual form
    pub body_raw: Option<String>,
}

impl RequestData {
    pub fn new(name: &str, method: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            method: method.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn from_prepared(name: &str, request: &PreparedRequest) -> Self {
        Self {
            name: name.to_string(),
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body_raw: match &request.body {
                RequestBody::Json(_) | RequestBody::Text(_) => request.body.raw_text(),
                _ => None,
            },
        }
    }
}

/// Response data available to scripts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    pub status: u16,
    pub status_text: String,
    pub headers: IndexMap<String, String>,
    pub body: String,
    pub response_time_ms: u64,
}

impl ResponseData {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into(), ..Default::default() }
    }
}

impl From<&HttpResponse> for ResponseData {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            response_time_ms: response.response_time_ms,
        }
    }
}

/// Everything injected into one script execution
#[derive(Debug, Clone, Default)]
pub struct ScriptContext {
    request: Option<RequestData>,
    response: Option<ResponseData>,
    variables: IndexMap<String, String>,
    environment: IndexMap<String, String>,
    globals: IndexMap<String, String>,
}

impl ScriptContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, request: RequestData) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_response(mut self, response: ResponseData) -> Self {
        self.response = Some(response);
        self
    }

    /// Effective value of every variable visible to the script
    pub fn with_variables(mut self, variables: IndexMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// What `pm.environment.get` reads
    pub fn with_environment(mut self, environment: IndexMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    /// What `pm.globals.get` reads
    pub fn with_globals(mut self, globals: IndexMap<String, String>) -> Self {
        self.globals = globals;
        self
    }

    pub fn set_variable(&mut self, key: &str, value: &str) {
        self.variables.insert(key.to_string(), value.to_string());
    }

    pub fn request(&self) -> Option<&RequestData> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&ResponseData> {
        self.response.as_ref()
    }

    pub fn variables(&self) -> &IndexMap<String, String> {
        &self.variables
    }

    pub fn environment(&self) -> &IndexMap<String, String> {
        &self.environment
    }

    pub fn globals(&self) -> &IndexMap<String, String> {
        &self.globals
    }

    pub fn request_name(&self) -> &str {
        self.request.as_ref().map(|r| r.name.as_str()).unwrap_or("Unknown")
    }
}
