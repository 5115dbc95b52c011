//! Centralized gateway configuration.
//!
//! Configuration is loaded via the `config` crate from an optional TOML file
//! followed by environment variables, so an empty environment yields a
//! working development setup. Environment variables are prefixed with
//! `BANDSTAND` and use `__` as the nesting separator, e.g.
//! `BANDSTAND_API__BASE_URL` or `BANDSTAND_SESSION__ACCESS_MAX_AGE_MINUTES`.
//!
//! See [`SessionSettings`] and [`EdgeSettings`] for the library sections.

use bandstand_edge::{AppKind, EdgeSettings, RouteRuleConfig};
use bandstand_session::SessionSettings;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "BANDSTAND_CONFIG";

/// Configuration file used when `BANDSTAND_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "gateway.toml";

/// Gateway configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Address the server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Application fronted by this gateway; selects the built-in route table.
    #[serde(default)]
    pub app: AppKind,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cookies: CookieConfig,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub edge: EdgeSettings,

    /// Replaces the built-in route table when set.
    #[serde(default)]
    pub routes: Option<Vec<RouteRuleConfig>>,

    /// Directory served under `/static`.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

/// Remote API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds; `0` disables it.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

impl ApiConfig {
    /// Returns the request timeout, if enabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Cookie-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure: bool,

    /// Lifetime of the locale preference cookie, in days.
    #[serde(default = "default_locale_max_age_days")]
    pub locale_max_age_days: i64,
}

fn default_secure_cookies() -> bool {
    true
}

fn default_locale_max_age_days() -> i64 {
    365
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: default_secure_cookies(),
            locale_max_age_days: default_locale_max_age_days(),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the file named by `BANDSTAND_CONFIG`
    /// (default `gateway.toml`, optional) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or a value has the wrong type.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Loads configuration from the given file (optional) and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or a value has the wrong type.
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BANDSTAND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
