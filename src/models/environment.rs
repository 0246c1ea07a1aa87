//! Environment and globals files

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::PostrunError;

/// Maximum environment/globals file size (4 MB)
const MAX_VARIABLES_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// A named, switchable variable set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentFile {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub values: Vec<EnvironmentValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentValue {
    pub key: String,

    #[serde(default, deserialize_with = "scalar_to_string")]
    pub value: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Postman exports the odd number or boolean where a string is expected
fn scalar_to_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(stringify(&JsonValue::deserialize(deserializer)?))
}

fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl EnvironmentValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), enabled: true }
    }
}

impl EnvironmentFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.push(EnvironmentValue::new(key, value));
        self
    }

    pub fn load(path: &Path) -> Result<Self, PostrunError> {
        let content = read_limited(path)?;
        Self::from_json_str(&content)
            .map_err(|e| PostrunError::Import(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate environment JSON, generating an id when missing
    pub fn from_json_str(content: &str) -> Result<Self, PostrunError> {
        let value: JsonValue = serde_json::from_str(content)
            .map_err(|e| PostrunError::Import(format!("Failed to parse environment: {}", e)))?;

        if value.get("name").is_none() || value.get("values").is_none() {
            return Err(PostrunError::Import(
                "Invalid environment format: `name` and `values` are required".to_string(),
            ));
        }

        let mut env: EnvironmentFile = serde_json::from_value(value)
            .map_err(|e| PostrunError::Import(format!("Invalid environment format: {}", e)))?;
        if env.id.is_empty() {
            env.id = uuid::Uuid::new_v4().to_string();
        }
        Ok(env)
    }

    /// Value of an enabled key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.iter()
            .find(|v| v.enabled && v.key == key)
            .map(|v| v.value.as_str())
    }

    /// Update the first entry with this key or append a new one
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|v| v.key == key) {
            Some(existing) => {
                existing.value = value;
                existing.enabled = true;
            }
            None => self.values.push(EnvironmentValue::new(key, value)),
        }
    }
}

/// Load a globals file
///
/// Accepts a Postman globals export (`{"values": [...]}`) or a flat
/// `{"key": "value"}` object.
pub fn load_globals(path: &Path) -> Result<IndexMap<String, String>, PostrunError> {
    let content = read_limited(path)?;
    parse_globals(&content).map_err(|e| PostrunError::Import(format!("{}: {}", path.display(), e)))
}

pub fn parse_globals(content: &str) -> Result<IndexMap<String, String>, PostrunError> {
    let value: JsonValue = serde_json::from_str(content)
        .map_err(|e| PostrunError::Import(format!("Failed to parse globals: {}", e)))?;

    let JsonValue::Object(obj) = &value else {
        return Err(PostrunError::Import("Globals must be a JSON object".to_string()));
    };

    if let Some(values) = obj.get("values").filter(|v| v.is_array()) {
        let values: Vec<EnvironmentValue> = serde_json::from_value(values.clone())
            .map_err(|e| PostrunError::Import(format!("Invalid globals format: {}", e)))?;
        return Ok(values.into_iter()
            .filter(|v| v.enabled)
            .map(|v| (v.key, v.value))
            .collect());
    }

    Ok(obj.iter().map(|(k, v)| (k.clone(), stringify(v))).collect())
}

fn read_limited(path: &Path) -> Result<String, PostrunError> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_VARIABLES_FILE_SIZE {
        return Err(PostrunError::Import(format!(
            "{}: file too large ({} bytes, max {})",
            path.display(), metadata.len(), MAX_VARIABLES_FILE_SIZE
        )));
    }
    Ok(fs::read_to_string(path)?)
}
