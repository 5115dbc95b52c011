//! Session gateway settings.
//!
//! Fields with defaults can be omitted when loading from configuration.

use bandstand_credentials::{CredentialNames, clamped_max_age};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// How the identity endpoint is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityEndpoint {
    /// `GET {identity_path}`; the remote side resolves the bearer.
    #[default]
    Current,
    /// `GET {identity_path}/{id}` with the subject of the access credential.
    BySubject,
}

/// Settings for talking to the remote API on behalf of a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Cookie names of the access and refresh credentials.
    #[serde(default)]
    pub credentials: CredentialNames,

    /// Access credential lifetime applied when the remote side sends a
    /// shorter one or none.
    #[serde(default = "default_access_max_age_minutes")]
    pub access_max_age_minutes: i64,

    /// Refresh credential lifetime for "remember me" sessions.
    #[serde(default = "default_remembered_refresh_max_age_days")]
    pub remembered_refresh_max_age_days: i64,

    #[serde(default)]
    pub identity_endpoint: IdentityEndpoint,

    #[serde(default = "default_identity_path")]
    pub identity_path: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Prefix for federated sign-in; the provider name is appended.
    #[serde(default = "default_federated_path_prefix")]
    pub federated_path_prefix: String,
}

fn default_access_max_age_minutes() -> i64 {
    15
}

fn default_remembered_refresh_max_age_days() -> i64 {
    30
}

fn default_identity_path() -> String {
    "/user".to_string()
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/auth/logout".to_string()
}

fn default_federated_path_prefix() -> String {
    "/auth".to_string()
}

impl SessionSettings {
    /// Returns the access credential lifetime, capped to the longest cookie age.
    #[must_use]
    pub fn access_max_age(&self) -> Duration {
        clamped_max_age(self.access_max_age_minutes.saturating_mul(60))
    }

    /// Returns the refresh credential lifetime for remembered sessions.
    #[must_use]
    pub fn remembered_refresh_max_age(&self) -> Duration {
        clamped_max_age(self.remembered_refresh_max_age_days.saturating_mul(24 * 60 * 60))
    }

    /// Returns the sign-in path for a federated identity provider.
    #[must_use]
    pub fn federated_path(&self, provider: &str) -> String {
        format!(
            "{}/{}",
            self.federated_path_prefix.trim_end_matches('/'),
            provider
        )
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            credentials: CredentialNames::default(),
            access_max_age_minutes: default_access_max_age_minutes(),
            remembered_refresh_max_age_days: default_remembered_refresh_max_age_days(),
            identity_endpoint: IdentityEndpoint::default(),
            identity_path: default_identity_path(),
            login_path: default_login_path(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            federated_path_prefix: default_federated_path_prefix(),
        }
    }
}
