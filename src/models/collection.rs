//! Postman collection model
//!
//! Only the parts of the v2.x collection format that the runner executes are
//! modelled: folders, requests, headers, bodies, basic auth and lifecycle
//! scripts. Unknown fields are ignored.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::PostrunError;

/// Maximum collection file size (16 MB)
const MAX_COLLECTION_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// A Postman collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub info: CollectionInfo,

    #[serde(default)]
    pub item: Vec<CollectionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    #[serde(rename = "_postman_id")]
    pub postman_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// A folder or a request leaf
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    /// Present on request leaves only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestTemplate>,

    /// Present on folders only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Vec<CollectionItem>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event: Vec<Event>,
}

/// Borrowed view of what an item is
#[derive(Debug, Clone, Copy)]
pub enum ItemKind<'a> {
    Folder(&'a [CollectionItem]),
    Request(&'a RequestTemplate),
    Empty,
}

/// A request template as stored in the collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTemplate {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<RequestUrl>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<HeaderEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBodyTemplate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthTemplate>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            method: default_method(),
            url: None,
            header: Vec::new(),
            body: None,
            auth: None,
        }
    }
}

/// URL in either of Postman's two encodings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestUrl {
    Raw(String),
    Structured(StructuredUrl),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredUrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<UrlParts>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<UrlParts>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<QueryParam>,
}

/// `host` and `path` are either a single string or a list of segments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlParts {
    Joined(String),
    Segments(Vec<JsonValue>),
}

impl UrlParts {
    fn join(&self, separator: &str) -> String {
        match self {
            UrlParts::Joined(s) => s.clone(),
            UrlParts::Segments(segments) => segments
                .iter()
                .filter_map(|segment| match segment {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Object(obj) => obj.get("value").and_then(|v| v.as_str()).map(String::from),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(separator),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParam {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub disabled: bool,
}

impl RequestUrl {
    /// The URL text before variable substitution
    ///
    /// Structured URLs use `raw` when present and are rebuilt from their parts
    /// otherwise. Returns `None` when nothing usable is present.
    pub fn template(&self) -> Option<String> {
        match self {
            RequestUrl::Raw(raw) => Some(raw.clone()),
            RequestUrl::Structured(url) => {
                if let Some(raw) = url.raw.as_ref().filter(|r| !r.is_empty()) {
                    return Some(raw.clone());
                }

                let host = url.host.as_ref().map(|h| h.join(".")).unwrap_or_default();
                if host.is_empty() {
                    return None;
                }

                let mut rebuilt = String::new();
                if let Some(protocol) = &url.protocol {
                    rebuilt.push_str(protocol);
                    rebuilt.push_str("://");
                }
                rebuilt.push_str(&host);
                if let Some(port) = &url.port {
                    rebuilt.push(':');
                    rebuilt.push_str(port);
                }
                if let Some(path) = &url.path {
                    let path = path.join("/");
                    if !path.is_empty() {
                        if !path.starts_with('/') {
                            rebuilt.push('/');
                        }
                        rebuilt.push_str(&path);
                    }
                }

                let query: Vec<String> = url.query.iter()
                    .filter(|q| !q.disabled)
                    .map(|q| match &q.value {
                        Some(value) => format!("{}={}", q.key, value),
                        None => q.key.clone(),
                    })
                    .collect();
                if !query.is_empty() {
                    rebuilt.push('?');
                    rebuilt.push_str(&query.join("&"));
                }

                Some(rebuilt)
            }
        }
    }
}

/// A request header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,

    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), disabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }
}

/// Body modes supported by the builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyMode {
    #[default]
    None,
    Raw,
    Urlencoded,
    Formdata,
    /// `file`, `graphql` and anything newer; sent without a body
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestBodyTemplate {
    #[serde(default)]
    pub mode: BodyMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urlencoded: Vec<FormParam>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formdata: Vec<FormParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<JsonValue>,
}

impl RequestBodyTemplate {
    pub fn raw(text: impl Into<String>) -> Self {
        Self { mode: BodyMode::Raw, raw: Some(text.into()), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormParam {
    pub key: String,

    #[serde(default)]
    pub value: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

impl FormParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), disabled: false }
    }
}

/// Request-level auth block (`{"type": "basic", "basic": [...]}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthTemplate {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub basic: Vec<AuthParam>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthParam {
    pub key: String,

    #[serde(default)]
    pub value: JsonValue,
}

impl AuthTemplate {
    /// Username/password pair of a `basic` auth block
    pub fn basic_credentials(&self) -> Option<(String, String)> {
        if !self.kind.eq_ignore_ascii_case("basic") {
            return None;
        }
        let field = |name: &str| {
            self.basic.iter()
                .find(|p| p.key == name)
                .map(|p| match &p.value {
                    JsonValue::String(s) => s.clone(),
                    JsonValue::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };
        Some((field("username"), field("password")))
    }
}

/// Script lifecycle hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Listen {
    Prerequest,
    Test,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub listen: Listen,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ScriptExec>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// `exec` is a single string or a list of lines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptExec {
    Text(String),
    Lines(Vec<String>),
}

impl ScriptExec {
    /// Script source ready for compilation
    ///
    /// Lines are joined with newlines, then every literal backslash-n pair
    /// becomes a real line break. Collections that were re-serialized by hand
    /// often carry escaped newlines, and a `//` comment would otherwise swallow
    /// every following statement.
    pub fn source(&self) -> String {
        let joined = match self {
            ScriptExec::Text(text) => text.clone(),
            ScriptExec::Lines(lines) => lines.join("\n"),
        };
        joined.replace("\\n", "\n")
    }
}

impl Event {
    pub fn new(listen: Listen, source: impl Into<String>) -> Self {
        Self {
            listen,
            script: Some(ScriptBlock {
                exec: Some(ScriptExec::Text(source.into())),
                kind: Some("text/javascript".to_string()),
            }),
        }
    }
}

impl CollectionItem {
    /// A request leaf
    pub fn request(name: impl Into<String>, request: RequestTemplate) -> Self {
        Self { name: name.into(), request: Some(request), ..Default::default() }
    }

    /// A folder
    pub fn folder(name: impl Into<String>, children: Vec<CollectionItem>) -> Self {
        Self { name: name.into(), item: Some(children), ..Default::default() }
    }

    pub fn with_event(mut self, event: Event) -> Self {
        self.event.push(event);
        self
    }

    pub fn kind(&self) -> ItemKind<'_> {
        match (&self.request, &self.item) {
            (Some(request), _) => ItemKind::Request(request),
            (None, Some(children)) => ItemKind::Folder(children),
            (None, None) => ItemKind::Empty,
        }
    }

    /// Normalized source of the first non-empty script for a hook
    pub fn script(&self, listen: Listen) -> Option<String> {
        self.event.iter()
            .filter(|e| e.listen == listen)
            .filter_map(|e| e.script.as_ref()?.exec.as_ref())
            .map(ScriptExec::source)
            .find(|source| !source.trim().is_empty())
    }
}

/// A request leaf with its position in the collection
#[derive(Debug, Clone)]
pub struct FlatRequest<'a> {
    /// Item id, or `request-<n>` when the collection has none
    pub id: String,
    pub name: &'a str,
    /// Folder path joined with ` / `, ending in the request name
    pub path: String,
    /// 1-based position in the flattened list
    pub index: usize,
    pub item: &'a CollectionItem,
    pub request: &'a RequestTemplate,
}

impl Collection {
    pub fn new(name: impl Into<String>, items: Vec<CollectionItem>) -> Self {
        Self {
            info: CollectionInfo {
                postman_id: uuid::Uuid::new_v4().to_string(),
                name: name.into(),
                schema: None,
            },
            item: items,
        }
    }

    /// Load and validate a collection file
    pub fn load(path: &Path) -> Result<Self, PostrunError> {
        let metadata = fs::metadata(path)?;
        if metadata.len() > MAX_COLLECTION_FILE_SIZE {
            return Err(PostrunError::Import(format!(
                "{}: collection file too large ({} bytes, max {})",
                path.display(), metadata.len(), MAX_COLLECTION_FILE_SIZE
            )));
        }

        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
            .map_err(|e| PostrunError::Import(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate collection JSON
    pub fn from_json_str(content: &str) -> Result<Self, PostrunError> {
        let value: JsonValue = serde_json::from_str(content)
            .map_err(|e| PostrunError::Import(format!("Failed to parse collection: {}", e)))?;

        let has_id = value.get("info")
            .and_then(|info| info.get("_postman_id"))
            .is_some();
        if !has_id || value.get("item").is_none() {
            return Err(PostrunError::Import(
                "Invalid Postman collection format: `info._postman_id` and `item` are required".to_string(),
            ));
        }

        let collection: Collection = serde_json::from_value(value)
            .map_err(|e| PostrunError::Import(format!("Invalid Postman collection format: {}", e)))?;
        validate_items(&collection.item)?;

        Ok(collection)
    }

    /// Every request leaf in document order
    pub fn requests(&self) -> Vec<FlatRequest<'_>> {
        let mut out = Vec::new();
        flatten(&self.item, "", &mut out);
        out
    }

    /// Find a request by id, then by name, then by full path
    pub fn find_request(&self, needle: &str) -> Option<FlatRequest<'_>> {
        let requests = self.requests();
        let position = requests.iter().position(|r| r.item.id.as_deref() == Some(needle))
            .or_else(|| requests.iter().position(|r| r.name == needle))
            .or_else(|| requests.iter().position(|r| r.path == needle))?;
        requests.into_iter().nth(position)
    }

    /// Copy of the collection keeping only the requests `keep` accepts
    ///
    /// Folders left without any request are dropped.
    pub fn filtered<F>(&self, keep: F) -> Collection
    where
        F: Fn(&FlatRequest<'_>) -> bool,
    {
        let kept: HashSet<usize> = self.requests().into_iter()
            .filter(|r| keep(r))
            .map(|r| r.index)
            .collect();

        let mut seen = 0;
        Collection {
            info: self.info.clone(),
            item: retain_items(&self.item, &kept, &mut seen),
        }
    }
}

fn validate_items(items: &[CollectionItem]) -> Result<(), PostrunError> {
    for item in items {
        if item.request.is_some() && item.item.is_some() {
            return Err(PostrunError::Import(format!(
                "Item '{}' is both a folder and a request", item.name
            )));
        }
        if let Some(children) = &item.item {
            validate_items(children)?;
        }
    }
    Ok(())
}

fn item_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{} / {}", parent, name)
    }
}

fn flatten<'a>(items: &'a [CollectionItem], parent: &str, out: &mut Vec<FlatRequest<'a>>) {
    for item in items {
        let path = item_path(parent, &item.name);
        match item.kind() {
            ItemKind::Request(request) => {
                let index = out.len() + 1;
                out.push(FlatRequest {
                    id: item.id.clone().unwrap_or_else(|| format!("request-{}", index - 1)),
                    name: &item.name,
                    path,
                    index,
                    item,
                    request,
                });
            }
            ItemKind::Folder(children) => flatten(children, &path, out),
            ItemKind::Empty => {}
        }
    }
}

/// Keep request leaves by flattened index (`seen` counts leaves in document order)
fn retain_items(items: &[CollectionItem], kept: &HashSet<usize>, seen: &mut usize) -> Vec<CollectionItem> {
    let mut out = Vec::new();
    for item in items {
        match item.kind() {
            ItemKind::Request(_) => {
                *seen += 1;
                if kept.contains(&*seen) {
                    out.push(item.clone());
                }
            }
            ItemKind::Folder(children) => {
                let children = retain_items(children, kept, seen);
                if !children.is_empty() {
                    let mut folder = item.clone();
                    folder.item = Some(children);
                    out.push(folder);
                }
            }
            ItemKind::Empty => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "info": {"_postman_id": "abc", "name": "Routes"},
        "item": [
            {"name": "Login", "request": {"method": "POST", "url": "{{base}}/login"}},
            {"name": "Cities", "item": [
                {"name": "Origin", "id": "o-1", "request": {"url": {"raw": "{{base}}/city/{{origin}}"}},
                 "event": [{"listen": "test", "script": {"exec": ["const cidade = \"X\";", "pm.test('ok', function() {});"]}}]},
                {"name": "Destination", "request": {"url": {"protocol": "https", "host": ["api", "example", "com"], "path": ["city", ":id"]}}}
            ]},
            {"name": "Empty folder", "item": []}
        ]
    }"#;

    #[test]
    fn test_parse_and_flatten() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        let requests = collection.requests();

        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].name, "Login");
        assert_eq!(requests[0].request.method, "POST");
        assert_eq!(requests[1].path, "Cities / Origin");
        assert_eq!(requests[1].id, "o-1");
        assert_eq!(requests[2].index, 3);
        assert_eq!(requests[2].id, "request-2");
    }

    #[test]
    fn test_default_method_is_get() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        assert_eq!(collection.requests()[1].request.method, "GET");
    }

    #[test]
    fn test_missing_postman_id_rejected() {
        let err = Collection::from_json_str(r#"{"info": {"name": "x"}, "item": []}"#).unwrap_err();
        assert!(matches!(err, PostrunError::Import(_)));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(Collection::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_folder_with_request_rejected() {
        let json = r#"{"info": {"_postman_id": "a", "name": "x"}, "item": [
            {"name": "bad", "request": {"url": "http://x"}, "item": []}
        ]}"#;
        assert!(Collection::from_json_str(json).is_err());
    }

    #[test]
    fn test_structured_url_rebuilt_without_raw() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        let url = collection.requests()[2].request.url.as_ref().unwrap().template();
        assert_eq!(url.as_deref(), Some("https://api.example.com/city/:id"));
    }

    #[test]
    fn test_structured_url_prefers_raw() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        let url = collection.requests()[1].request.url.as_ref().unwrap().template();
        assert_eq!(url.as_deref(), Some("{{base}}/city/{{origin}}"));
    }

    #[test]
    fn test_script_lines_joined() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        let script = collection.requests()[1].item.script(Listen::Test).unwrap();
        assert_eq!(script, "const cidade = \"X\";\npm.test('ok', function() {});");
        assert!(collection.requests()[1].item.script(Listen::Prerequest).is_none());
    }

    #[test]
    fn test_script_literal_newlines_unescaped() {
        let exec = ScriptExec::Text("// comment\\nvar a = 1;".to_string());
        assert_eq!(exec.source(), "// comment\nvar a = 1;");
    }

    #[test]
    fn test_find_request() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        assert_eq!(collection.find_request("o-1").unwrap().name, "Origin");
        assert_eq!(collection.find_request("Destination").unwrap().index, 3);
        assert_eq!(collection.find_request("Cities / Origin").unwrap().index, 2);
        assert!(collection.find_request("nope").is_none());
    }

    #[test]
    fn test_filtered_drops_empty_folders() {
        let collection = Collection::from_json_str(SAMPLE).unwrap();
        let filtered = collection.filtered(|r| r.name == "Login");

        assert_eq!(filtered.requests().len(), 1);
        assert_eq!(filtered.item.len(), 1);
    }

    #[test]
    fn test_filtered_same_name_requests_kept_apart() {
        let login = |id: &str| CollectionItem {
            id: Some(id.to_string()),
            ..CollectionItem::request("Login", RequestTemplate::default())
        };
        let collection = Collection::new("c", vec![
            login("id-a"),
            CollectionItem::folder("Auth", vec![login("id-c"), login("id-d")]),
            login("id-b"),
        ]);

        let skipped = collection.filtered(|r| r.item.id.as_deref() != Some("id-a"));
        let ids: Vec<_> = skipped.requests().iter().map(|r| r.item.id.clone()).collect();
        assert_eq!(ids, vec![Some("id-c".to_string()), Some("id-d".to_string()), Some("id-b".to_string())]);

        let only = collection.filtered(|r| r.item.id.as_deref() == Some("id-d"));
        let ids: Vec<_> = only.requests().iter().map(|r| r.item.id.clone()).collect();
        assert_eq!(ids, vec![Some("id-d".to_string())]);
        assert_eq!(only.item.len(), 1);
    }

    #[test]
    fn test_basic_auth_block() {
        let auth = AuthTemplate {
            kind: "basic".to_string(),
            basic: vec![
                AuthParam { key: "username".to_string(), value: JsonValue::String("{{user}}".to_string()) },
                AuthParam { key: "password".to_string(), value: JsonValue::String("pw".to_string()) },
            ],
        };
        assert_eq!(auth.basic_credentials(), Some(("{{user}}".to_string(), "pw".to_string())));

        let bearer = AuthTemplate { kind: "bearer".to_string(), basic: vec![] };
        assert!(bearer.basic_credentials().is_none());
    }

    #[test]
    fn test_unknown_body_mode() {
        let body: RequestBodyTemplate = serde_json::from_str(r#"{"mode": "graphql"}"#).unwrap();
        assert_eq!(body.mode, BodyMode::Unsupported);
    }
}
