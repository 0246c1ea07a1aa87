//! HTTP Basic Authentication (RFC 7617)

use base64::Engine;
use indexmap::IndexMap;

/// HTTP Basic Authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password_set", &!self.password.is_empty())
            .finish()
    }
}

impl BasicAuth {
    /// Create new Basic auth with username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Both parts empty
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// `Basic base64(user:password)`
    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        format!("Basic {}", encoded)
    }

    /// Apply Basic auth header to request headers
    pub fn apply(&self, headers: &mut IndexMap<String, String>) {
        headers.retain(|name, _| !name.eq_ignore_ascii_case("authorization"));
        headers.insert("Authorization".to_string(), self.header_value());
    }
}
