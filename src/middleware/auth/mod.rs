//! Authentication middleware
//!
//! Decides which Basic credentials, if any, a request carries.

mod basic;

pub use basic::BasicAuth;

use tracing::{debug, warn};

use crate::variables::{resolve, VariableLookup};

/// Variable that switches global auth on when set to `"true"`
pub const ENABLE_GLOBAL_AUTH_VAR: &str = "enableGlobalAuth";
pub const USER_VAR: &str = "user";
pub const PASSWORD_VAR: &str = "password";

/// Inputs of the auth decision for one request
#[derive(Debug, Clone, Default)]
pub struct AuthPolicy {
    /// Request-level username/password; may contain `{{tokens}}`
    pub request_credentials: Option<(String, String)>,
    /// Global auth forced by configuration or command line
    pub force_global: bool,
}

impl AuthPolicy {
    pub fn global(force_global: bool) -> Self {
        Self { request_credentials: None, force_global }
    }

    pub fn with_request_credentials(mut self, credentials: Option<(String, String)>) -> Self {
        self.request_credentials = credentials;
        self
    }

    /// Credentials to send, or `None` for an unauthenticated request
    ///
    /// Request credentials win. Global credentials (`user`/`password`) are
    /// used when global auth is forced, when `enableGlobalAuth` is `"true"`,
    /// or when both `user` and `password` resolve to non-empty values.
    pub fn credentials(&self, lookup: &(impl VariableLookup + ?Sized)) -> Option<BasicAuth> {
        let auth = if let Some((username, password)) = &self.request_credentials {
            debug!("Using request-level authentication");
            BasicAuth::new(resolve(username, lookup), resolve(password, lookup))
        } else {
            let enabled = self.force_global
                || lookup.lookup(ENABLE_GLOBAL_AUTH_VAR).as_deref() == Some("true");
            let user = lookup.lookup(USER_VAR).unwrap_or_default();
            let password = lookup.lookup(PASSWORD_VAR).unwrap_or_default();

            if !enabled && (user.is_empty() || password.is_empty()) {
                return None;
            }

            debug!(user = %user, password_set = !password.is_empty(), "Using global authentication");
            BasicAuth::new(user, password)
        };

        if auth.is_empty() {
            warn!("Authentication requested but username and password are empty, no Authorization header added");
            return None;
        }
        Some(auth)
    }
}
