//! Request builder
//!
//! Turns a collection request template into a transport-ready request:
//! variables substituted, gateway rewrite applied, body encoded and auth
//! attached.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::errors::PostrunError;
use crate::middleware::AuthPolicy;
use crate::models::{BodyMode, RequestBodyTemplate, RequestTemplate};
use crate::variables::{resolve, VariableLookup};

use super::proxy::{GatewaySettings, FORWARDED_HEADER};

const CONTENT_TYPE: &str = "Content-Type";
const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request ready to be handed to a transport
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRequest {
    pub method: String,
    /// URL after variable substitution
    pub url: String,
    /// URL after the gateway rewrite
    pub proxied_url: String,
    pub headers: IndexMap<String, String>,
    pub body: RequestBody,
}

/// Encoded request body
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "mode", content = "data", rename_all = "lowercase")]
pub enum RequestBody {
    #[default]
    None,
    Json(JsonValue),
    Text(String),
    UrlEncoded(Vec<(String, String)>),
    FormData(Vec<(String, String)>),
}

impl RequestBody {
    /// Body as text, for bodies that have a textual form
    pub fn raw_text(&self) -> Option<String> {
        match self {
            RequestBody::Json(value) => serde_json::to_string(value).ok(),
            RequestBody::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RequestBody::None)
    }
}

impl PreparedRequest {
    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    headers.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Builds [`PreparedRequest`]s for one run configuration
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    gateway: GatewaySettings,
    force_global_auth: bool,
}

impl RequestBuilder {
    pub fn new(gateway: GatewaySettings, force_global_auth: bool) -> Self {
        Self { gateway, force_global_auth }
    }

    pub fn gateway(&self) -> &GatewaySettings {
        &self.gateway
    }

    /// Assemble a request
    ///
    /// Fails only when the template has no usable URL.
    pub fn build(
        &self,
        template: &RequestTemplate,
        lookup: &(impl VariableLookup + ?Sized),
    ) -> Result<PreparedRequest, PostrunError> {
        let url_template = template.url.as_ref()
            .and_then(|url| url.template())
            .ok_or_else(|| PostrunError::Parse("Invalid URL format in request".to_string()))?;

        let url = resolve(&url_template, lookup);
        let proxied_url = self.gateway.rewrite(&url);
        let method = resolve(&template.method, lookup).to_uppercase();
        debug!(method = %method, url = %url, proxied_url = %proxied_url, "Building request");

        let mut headers: IndexMap<String, String> = IndexMap::new();
        for header in template.header.iter().filter(|h| h.is_enabled()) {
            headers.insert(header.key.clone(), resolve(&header.value, lookup));
        }

        let body = match &template.body {
            Some(body) => build_body(body, &mut headers, lookup),
            None => RequestBody::None,
        };

        if self.gateway.enabled {
            let (name, value) = FORWARDED_HEADER;
            headers.insert(name.to_string(), value.to_string());
        }

        let policy = AuthPolicy::global(self.force_global_auth)
            .with_request_credentials(template.auth.as_ref().and_then(|a| a.basic_credentials()));
        if let Some(auth) = policy.credentials(lookup) {
            auth.apply(&mut headers);
        }

        Ok(PreparedRequest { method, url, proxied_url, headers, body })
    }
}

fn build_body(
    body: &RequestBodyTemplate,
    headers: &mut IndexMap<String, String>,
    lookup: &(impl VariableLookup + ?Sized),
) -> RequestBody {
    match body.mode {
        BodyMode::Raw => {
            let Some(raw) = &body.raw else {
                return RequestBody::None;
            };
            let text = resolve(raw, lookup);

            match find_header(headers, CONTENT_TYPE).map(String::from) {
                None => match parse_json_document(&text) {
                    Some(value) => {
                        headers.insert(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string());
                        RequestBody::Json(value)
                    }
                    None => {
                        headers.insert(CONTENT_TYPE.to_string(), TEXT_CONTENT_TYPE.to_string());
                        RequestBody::Text(text)
                    }
                },
                Some(content_type) if content_type.contains(JSON_CONTENT_TYPE) => {
                    match serde_json::from_str(&text) {
                        Ok(value) => RequestBody::Json(value),
                        Err(e) => {
                            warn!(error = %e, "Failed to parse JSON body, sending raw text");
                            RequestBody::Text(text)
                        }
                    }
                }
                Some(_) => RequestBody::Text(text),
            }
        }
        BodyMode::Urlencoded => {
            if find_header(headers, CONTENT_TYPE).is_none() {
                headers.insert(CONTENT_TYPE.to_string(), FORM_CONTENT_TYPE.to_string());
            }
            RequestBody::UrlEncoded(form_pairs(&body.urlencoded, lookup))
        }
        BodyMode::Formdata => RequestBody::FormData(form_pairs(&body.formdata, lookup)),
        BodyMode::None => RequestBody::None,
        BodyMode::Unsupported => {
            warn!("Unsupported body mode, sending request without a body");
            RequestBody::None
        }
    }
}

/// A JSON object or array, recognised by its delimiters before parsing
fn parse_json_document(text: &str) -> Option<JsonValue> {
    let trimmed = text.trim();
    let delimited = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !delimited {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn form_pairs(
    params: &[crate::models::FormParam],
    lookup: &(impl VariableLookup + ?Sized),
) -> Vec<(String, String)> {
    params.iter()
        .filter(|p| !p.disabled)
        .map(|p| (p.key.clone(), resolve(&p.value, lookup)))
        .collect()
}
