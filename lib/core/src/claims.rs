//! Claims carried in the access credential.
//!
//! The access credential is a JWT issued by the remote API. The gateway never
//! verifies its signature: the remote API does that on every call. The edge
//! filter only needs the role claim to route requests, and the session layer
//! only needs the subject to address the identity endpoint, so decoding the
//! payload segment is sufficient.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::fmt;

use crate::role::Role;

/// Errors from decoding an access credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// The token could not be decoded as a JWT.
    Malformed { reason: String },
    /// A required claim is missing or empty.
    MissingClaim { claim: &'static str },
    /// The role claim names a role the marketplace does not know.
    UnknownRole { role: String },
}

impl fmt::Display for ClaimsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => {
                write!(f, "failed to decode access credential: {reason}")
            }
            Self::MissingClaim { claim } => write!(f, "missing required claim: {claim}"),
            Self::UnknownRole { role } => write!(f, "unknown role claim: {role}"),
        }
    }
}

impl std::error::Error for ClaimsError {}

/// Subjects are strings, but numeric ids are common for database-backed APIs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Subject {
    Text(String),
    Number(serde_json::Number),
}

/// Raw payload as issued by the remote API.
#[derive(Debug, Deserialize)]
struct JwtClaims {
    #[serde(default)]
    sub: Option<Subject>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// The subset of access-credential claims the gateway relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    subject: String,
    role: Role,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessClaims {
    /// Creates claims directly, mainly for tests and fixtures.
    #[must_use]
    pub fn new(subject: impl Into<String>, role: Role) -> Self {
        Self {
            subject: subject.into(),
            role,
            expires_at: None,
        }
    }

    /// Decodes the payload of an access credential without verifying it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a JWT, or the subject or role
    /// claim is missing or unknown.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let claims = jsonwebtoken::dangerous::insecure_decode::<JwtClaims>(token)
            .map_err(|e| ClaimsError::Malformed {
                reason: e.to_string(),
            })?
            .claims;

        let subject = match claims.sub {
            Some(Subject::Text(s)) if !s.is_empty() => s,
            Some(Subject::Number(n)) => n.to_string(),
            _ => return Err(ClaimsError::MissingClaim { claim: "sub" }),
        };

        let role_name = claims
            .role
            .ok_or(ClaimsError::MissingClaim { claim: "role" })?;
        let role = role_name
            .parse()
            .map_err(|_| ClaimsError::UnknownRole { role: role_name })?;

        let expires_at = claims
            .exp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok(Self {
            subject,
            role,
            expires_at,
        })
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the role claim.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the expiry, if the token carries one.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload);
        format!("{header}.{body}.signature")
    }

    #[test]
    fn decodes_subject_and_role() {
        let token = token_with_payload(r#"{"sub":"42","role":"band","exp":1700000000}"#);
        let claims = AccessClaims::decode(&token).expect("decode");
        assert_eq!(claims.subject(), "42");
        assert_eq!(claims.role(), Role::Band);
        assert_eq!(
            claims.expires_at().map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn numeric_subject_is_accepted() {
        let token = token_with_payload(r#"{"sub":7,"role":"client"}"#);
        let claims = AccessClaims::decode(&token).expect("decode");
        assert_eq!(claims.subject(), "7");
        assert!(claims.expires_at().is_none());
    }

    #[test]
    fn rejects_non_jwt() {
        assert!(matches!(
            AccessClaims::decode("not-a-token"),
            Err(ClaimsError::Malformed { .. })
        ));
        assert!(matches!(
            AccessClaims::decode("a.b.c.d"),
            Err(ClaimsError::Malformed { .. })
        ));
    }

    #[test]
    fn rejects_garbage_payload() {
        assert!(matches!(
            AccessClaims::decode("a.!!!.c"),
            Err(ClaimsError::Malformed { .. })
        ));
        let token = token_with_payload("[1,2]");
        assert!(matches!(
            AccessClaims::decode(&token),
            Err(ClaimsError::Malformed { .. })
        ));
    }

    #[test]
    fn signature_is_not_checked() {
        let token = token_with_payload(r#"{"sub":"9","role":"client"}"#);
        let unsigned = format!("{}.", token.rsplit_once('.').map_or("", |(head, _)| head));
        let claims = AccessClaims::decode(&unsigned).expect("decode");
        assert_eq!(claims.subject(), "9");
    }

    #[test]
    fn rejects_missing_or_unknown_role() {
        let token = token_with_payload(r#"{"sub":"1"}"#);
        assert_eq!(
            AccessClaims::decode(&token),
            Err(ClaimsError::MissingClaim { claim: "role" })
        );

        let token = token_with_payload(r#"{"sub":"1","role":"admin"}"#);
        assert!(matches!(
            AccessClaims::decode(&token),
            Err(ClaimsError::UnknownRole { .. })
        ));
    }

    #[test]
    fn rejects_missing_subject() {
        let token = token_with_payload(r#"{"role":"band"}"#);
        assert_eq!(
            AccessClaims::decode(&token),
            Err(ClaimsError::MissingClaim { claim: "sub" })
        );
    }
}
