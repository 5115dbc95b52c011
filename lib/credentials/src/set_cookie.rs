//! Syntactic parsing of `Set-Cookie` headers emitted by the remote API.
//!
//! No validation of the cookie value is performed: credentials are opaque to
//! this layer. The parser splits on the first `name=value` pair and collects
//! the remaining `;`-separated attributes into a case-insensitive map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::credential::{CookiePolicy, Credential, SameSite, clamped_max_age};
use crate::error::SetCookieError;

/// A `Set-Cookie` value as delivered by the transport layer.
///
/// Some transports fold repeated headers into a single string, others hand
/// them over as a list. Both are normalised through [`RawSetCookie::into_vec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSetCookie {
    Single(String),
    Many(Vec<String>),
}

impl RawSetCookie {
    /// Normalises the raw header into a list of individual cookies.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(header) => vec![header],
            Self::Many(headers) => headers,
        }
    }
}

impl From<String> for RawSetCookie {
    fn from(header: String) -> Self {
        Self::Single(header)
    }
}

impl From<&str> for RawSetCookie {
    fn from(header: &str) -> Self {
        Self::Single(header.to_string())
    }
}

impl From<Vec<String>> for RawSetCookie {
    fn from(headers: Vec<String>) -> Self {
        Self::Many(headers)
    }
}

/// The value of a single cookie attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// A bare attribute such as `HttpOnly`, read as boolean true.
    Flag,
    /// A `key=value` attribute.
    Text(String),
}

impl AttributeValue {
    /// Returns the text value, or `None` for a flag.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Flag => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// A parsed `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCookie {
    pub name: String,
    pub value: String,
    /// Attributes keyed by lower-cased name.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl ParsedCookie {
    /// Looks up an attribute case-insensitively.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(&key.to_ascii_lowercase())
    }

    /// Returns true if the attribute is present, as a flag or with a value.
    #[must_use]
    pub fn has_flag(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    /// Derives the cookie policy from the attributes.
    ///
    /// A cookie without attributes gets the default policy. Otherwise the
    /// policy reflects exactly what the header states: missing flags are off
    /// and a missing or unknown `SameSite` reads as `Lax`.
    #[must_use]
    pub fn policy(&self) -> CookiePolicy {
        if self.attributes.is_empty() {
            return CookiePolicy::default();
        }

        let text = |key: &str| self.attribute(key).and_then(AttributeValue::as_text);

        let max_age = text("max-age")
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(clamped_max_age);
        let expires = text("expires").and_then(parse_cookie_date);

        CookiePolicy {
            http_only: self.has_flag("httponly"),
            same_site: text("samesite")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(SameSite::Lax),
            secure: self.has_flag("secure"),
            max_age,
            expires,
            path: text("path").unwrap_or("/").to_string(),
        }
    }

    /// Converts into a credential carrying the derived policy.
    #[must_use]
    pub fn into_credential(self) -> Credential {
        let policy = self.policy();
        Credential::new(self.name, self.value, policy)
    }
}

/// Parses a single `Set-Cookie` header.
///
/// # Errors
///
/// Returns an error if the header is empty or does not start with a
/// `name=value` pair.
pub fn parse_set_cookie(raw: &str) -> Result<ParsedCookie, SetCookieError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SetCookieError::Empty);
    }

    let mut segments = raw.split(';');
    let first = segments.next().unwrap_or_default().trim();
    let (name, value) = first
        .split_once('=')
        .ok_or_else(|| SetCookieError::MissingNameValue {
            segment: first.to_string(),
        })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(SetCookieError::EmptyName);
    }

    let mut attributes = BTreeMap::new();
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, attr) = match segment.split_once('=') {
            Some((key, attr)) => (key.trim(), AttributeValue::Text(attr.trim().to_string())),
            None => (segment, AttributeValue::Flag),
        };
        attributes.insert(key.to_ascii_lowercase(), attr);
    }

    Ok(ParsedCookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        attributes,
    })
}

/// Finds the credential called `name` among the emitted headers.
///
/// Headers that fail to parse are skipped: one malformed cookie from the
/// remote side must not hide a well-formed one.
#[must_use]
pub fn find_credential(raw: impl Into<RawSetCookie>, name: &str) -> Option<Credential> {
    raw.into()
        .into_vec()
        .iter()
        .filter_map(|header| match parse_set_cookie(header) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable set-cookie header");
                None
            }
        })
        .find(|parsed| parsed.name == name)
        .map(ParsedCookie::into_credential)
}

/// Parses an `Expires` attribute (IMF-fixdate or RFC 2822).
fn parse_cookie_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CookieJarStore, CredentialStore};
    use chrono::Duration;

    #[test]
    fn parses_name_value_and_attributes() {
        let parsed = parse_set_cookie("a=b; HttpOnly; Secure; SameSite=Lax; Max-Age=900")
            .expect("parse");
        assert_eq!(parsed.name, "a");
        assert_eq!(parsed.value, "b");
        assert_eq!(parsed.attribute("httponly"), Some(&AttributeValue::Flag));
        assert_eq!(parsed.attribute("secure"), Some(&AttributeValue::Flag));
        assert_eq!(
            parsed.attribute("samesite"),
            Some(&AttributeValue::Text("Lax".to_string()))
        );
        assert_eq!(
            parsed.attribute("max-age"),
            Some(&AttributeValue::Text("900".to_string()))
        );
        assert_eq!(parsed.attributes.len(), 4);
    }

    #[test]
    fn attribute_keys_are_case_insensitive() {
        let parsed = parse_set_cookie("a=b; HTTPONLY; max-AGE=10").expect("parse");
        assert!(parsed.has_flag("HttpOnly"));
        assert_eq!(
            parsed.attribute("Max-Age").and_then(AttributeValue::as_text),
            Some("10")
        );
    }

    #[test]
    fn value_may_contain_equals_signs() {
        let parsed = parse_set_cookie("token=abc==.def=; Path=/").expect("parse");
        assert_eq!(parsed.name, "token");
        assert_eq!(parsed.value, "abc==.def=");
    }

    #[test]
    fn bare_credential_gets_default_policy() {
        let parsed = parse_set_cookie("access_token=xyz").expect("parse");
        assert!(parsed.attributes.is_empty());
        assert_eq!(parsed.policy(), CookiePolicy::default());
    }

    #[test]
    fn policy_reflects_stated_attributes() {
        let parsed = parse_set_cookie("a=b; SameSite=Strict; Max-Age=900; Path=/app")
            .expect("parse");
        let policy = parsed.policy();
        assert!(!policy.http_only);
        assert!(!policy.secure);
        assert_eq!(policy.same_site, SameSite::Strict);
        assert_eq!(policy.max_age, Some(Duration::seconds(900)));
        assert_eq!(policy.path, "/app");
    }

    #[test]
    fn expires_attribute_is_parsed() {
        let parsed =
            parse_set_cookie("a=b; Expires=Wed, 21 Oct 2015 07:28:00 GMT").expect("parse");
        let expires = parsed.policy().expires.expect("expires");
        assert_eq!(expires.timestamp(), 1_445_412_480);
        assert!(parsed.policy().is_removal());
    }

    #[test]
    fn negative_max_age_is_a_removal() {
        let parsed = parse_set_cookie("a=; Max-Age=-1").expect("parse");
        assert_eq!(parsed.policy().max_age, Some(Duration::zero()));
        assert!(parsed.policy().is_removal());
    }

    #[test]
    fn oversized_max_age_is_capped() {
        let parsed = parse_set_cookie("access_token=a; Max-Age=9223372036854775807").expect("parse");
        assert_eq!(parsed.policy().max_age, Some(Duration::days(400)));

        let credential = parse_set_cookie("access_token=a; Max-Age=100000000000000")
            .expect("parse")
            .into_credential();
        let jar = CookieJarStore::new();
        jar.write(&credential.name, &credential.value, credential.policy);
        assert_eq!(jar.get("access_token").map(|c| c.value), Some("a".to_string()));
    }

    #[test]
    fn rejects_empty_and_nameless_headers() {
        assert_eq!(parse_set_cookie("  "), Err(SetCookieError::Empty));
        assert_eq!(parse_set_cookie("=value"), Err(SetCookieError::EmptyName));
        assert!(matches!(
            parse_set_cookie("HttpOnly; Secure"),
            Err(SetCookieError::MissingNameValue { .. })
        ));
    }

    #[test]
    fn raw_header_normalises_to_vec() {
        assert_eq!(RawSetCookie::from("a=b").into_vec(), vec!["a=b".to_string()]);
        let many = RawSetCookie::from(vec!["a=b".to_string(), "c=d".to_string()]);
        assert_eq!(many.into_vec().len(), 2);
    }

    #[test]
    fn raw_header_deserializes_from_string_or_array() {
        let single: RawSetCookie = serde_json::from_str(r#""a=b""#).expect("deserialize");
        assert_eq!(single, RawSetCookie::Single("a=b".to_string()));
        let many: RawSetCookie = serde_json::from_str(r#"["a=b","c=d"]"#).expect("deserialize");
        assert_eq!(many.into_vec(), vec!["a=b".to_string(), "c=d".to_string()]);
    }

    #[test]
    fn find_credential_picks_named_entry() {
        let headers = vec![
            "garbage".to_string(),
            "refresh_token=r1; HttpOnly".to_string(),
            "access_token=a1; HttpOnly; Max-Age=900".to_string(),
        ];
        let access = find_credential(headers, "access_token").expect("found");
        assert_eq!(access.value, "a1");
        assert_eq!(access.policy.max_age, Some(Duration::seconds(900)));

        assert!(find_credential("other=x", "access_token").is_none());
    }
}
