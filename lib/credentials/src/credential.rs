//! The credential model.
//!
//! A browser session holds two credentials issued together by the remote API:
//! a short-lived access credential attached to every API call, and a
//! long-lived refresh credential used only to renew the access credential.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two session credentials a cookie holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Authorizes API calls.
    Access,
    /// Authorizes renewal of the access credential only.
    Refresh,
}

/// Cookie names under which the two credentials are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialNames {
    #[serde(default = "default_access_name")]
    access: String,
    #[serde(default = "default_refresh_name")]
    refresh: String,
}

fn default_access_name() -> String {
    "access_token".to_string()
}

fn default_refresh_name() -> String {
    "refresh_token".to_string()
}

impl CredentialNames {
    /// Creates a custom naming.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Returns the cookie name for a credential kind.
    #[must_use]
    pub fn name_of(&self, kind: CredentialKind) -> &str {
        match kind {
            CredentialKind::Access => &self.access,
            CredentialKind::Refresh => &self.refresh,
        }
    }

    /// Returns the kind stored under `name`, if it is one of the two.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<CredentialKind> {
        if name == self.access {
            Some(CredentialKind::Access)
        } else if name == self.refresh {
            Some(CredentialKind::Refresh)
        } else {
            None
        }
    }
}

impl Default for CredentialNames {
    fn default() -> Self {
        Self::new(default_access_name(), default_refresh_name())
    }
}

/// The `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    /// Returns the attribute value as written in a header.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("unknown SameSite value: {other}")),
        }
    }
}

/// Longest lifetime a cookie may carry, in seconds (400 days, RFC 6265bis).
pub const MAX_COOKIE_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Builds a cookie lifetime from seconds, clamped to `0..=MAX_COOKIE_AGE_SECS`.
#[must_use]
pub fn clamped_max_age(secs: i64) -> Duration {
    Duration::seconds(secs.clamp(0, MAX_COOKIE_AGE_SECS))
}

/// Security and lifetime attributes of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub http_only: bool,
    pub same_site: SameSite,
    pub secure: bool,
    /// Lifetime relative to the moment of writing. `None` is a session cookie.
    pub max_age: Option<Duration>,
    /// Absolute expiry. When both are set, `max_age` takes precedence.
    pub expires: Option<DateTime<Utc>>,
    pub path: String,
}

impl CookiePolicy {
    /// Returns a copy of this policy with the given max-age.
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Returns a copy with the max-age raised to `floor` if it is shorter.
    ///
    /// A session cookie (no max-age) and an explicit expiry are left alone:
    /// only a shorter finite max-age is extended.
    #[must_use]
    pub fn with_min_max_age(mut self, floor: Option<Duration>) -> Self {
        if let Some(floor) = floor {
            match self.max_age {
                Some(current) if current >= floor => {}
                Some(_) => self.max_age = Some(floor),
                None if self.expires.is_none() => self.max_age = Some(floor),
                None => {}
            }
        }
        self
    }

    /// Returns true if writing a credential with this policy removes it.
    ///
    /// Servers delete cookies by sending a zero max-age or a past expiry.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        match (self.max_age, self.expires) {
            (Some(max_age), _) => max_age <= Duration::zero(),
            (None, Some(expires)) => expires <= Utc::now(),
            (None, None) => false,
        }
    }

    /// Computes the absolute expiry for a credential written at `written_at`.
    #[must_use]
    pub fn expiry_from(&self, written_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age
            .map(|max_age| {
                written_at
                    .checked_add_signed(max_age)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            })
            .or(self.expires)
    }
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            http_only: true,
            same_site: SameSite::Lax,
            secure: true,
            max_age: None,
            expires: None,
            path: "/".to_string(),
        }
    }
}

/// A named credential with its opaque value and cookie policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub value: String,
    pub policy: CookiePolicy,
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, policy: CookiePolicy) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            policy,
        }
    }
}
