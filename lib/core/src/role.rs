//! Marketplace roles carried in the access credential.
//!
//! Every account on the marketplace is exactly one of two kinds: a client
//! who books performers, or a band that receives and answers bookings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role claim of an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Books bands for events.
    Client,
    /// Performer account managing its band profile and booking requests.
    Band,
}

impl Role {
    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Band => "band",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a role name the marketplace does not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    /// The rejected input.
    pub value: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.value)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    /// Parses a role name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "band" => Ok(Self::Band),
            _ => Err(ParseRoleError {
                value: s.to_string(),
            }),
        }
    }
}
