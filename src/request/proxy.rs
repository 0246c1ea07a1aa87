//! Gateway URL rewriting
//!
//! Requests are not sent to their target directly: the gateway receives them
//! under a path prefix and forwards them upstream.

use url::Url;

/// Default path prefix the gateway listens on
pub const DEFAULT_PREFIX: &str = "/api-gateway";

/// Default gateway base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Header the gateway expects on forwarded requests
pub const FORWARDED_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// When false requests go to their resolved URL unchanged
    pub enabled: bool,
    pub base_url: String,
    pub prefix: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl GatewaySettings {
    pub fn disabled() -> Self {
        Self { enabled: false, ..Default::default() }
    }

    /// The URL to send for a resolved request URL
    pub fn rewrite(&self, url: &str) -> String {
        if self.enabled {
            proxy_url(url, &self.prefix)
        } else {
            url.to_string()
        }
    }

    /// Absolute URL for a rewritten one
    ///
    /// Gateway paths are joined onto the base URL; anything else is returned
    /// as is.
    pub fn target(&self, rewritten: &str) -> String {
        if self.enabled && rewritten.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), rewritten)
        } else {
            rewritten.to_string()
        }
    }
}

/// Rewrite a URL into a gateway path
///
/// - empty input is returned unchanged
/// - a URL already under the prefix (followed by `/`, `?` or nothing) is
///   returned unchanged
/// - an absolute URL keeps its path and query: `prefix + path + ?query`
/// - anything else is treated as a path (a leading `/` is added if missing)
pub fn proxy_url(url: &str, prefix: &str) -> String {
    if url.is_empty() || is_under_prefix(url, prefix) {
        return url.to_string();
    }

    match Url::parse(url) {
        Ok(parsed) => {
            let mut out = format!("{}{}", prefix, parsed.path());
            if let Some(query) = parsed.query() {
                out.push('?');
                out.push_str(query);
            }
            out
        }
        Err(_) if url.starts_with('/') => format!("{}{}", prefix, url),
        Err(_) => format!("{}/{}", prefix, url),
    }
}

fn is_under_prefix(url: &str, prefix: &str) -> bool {
    url.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}
