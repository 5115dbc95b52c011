//! Locale preference resolution.
//!
//! The locale of a request is taken from, in order: the locale cookie, the
//! `Accept-Language` header, then the configured fallback.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::EdgeConfigError;

/// A lower-cased language tag such as `en` or `pt-br`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the primary language subtag.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locale {
    type Err = EdgeConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let valid = !tag.is_empty()
            && tag.len() <= 35
            && tag
                .split('-')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
        if !valid {
            return Err(EdgeConfigError::InvalidLocale {
                tag: s.to_string(),
            });
        }
        Ok(Self(tag.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Locale {
    type Error = EdgeConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

/// Parses an `Accept-Language` header into tags by descending preference.
///
/// Entries with `q=0`, unparseable weights or the `*` wildcard are dropped.
/// Entries of equal weight keep their header order.
#[must_use]
pub fn parse_accept_language(header: &str) -> Vec<Locale> {
    let mut weighted: Vec<(Locale, f32)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag == "*" {
                return None;
            }
            let weight = match parts.find_map(|p| p.trim().strip_prefix("q=")) {
                Some(q) => q.trim().parse::<f32>().ok()?,
                None => 1.0,
            };
            if weight <= 0.0 {
                return None;
            }
            Some((tag.parse().ok()?, weight))
        })
        .collect();

    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    weighted.into_iter().map(|(locale, _)| locale).collect()
}

/// Supported locales, fallback and cookie name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleSettings {
    #[serde(default = "default_supported")]
    pub supported: Vec<Locale>,

    #[serde(default = "default_fallback")]
    pub fallback: Locale,

    /// Name of the cookie the resolved locale is stamped into.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_supported() -> Vec<Locale> {
    vec![Locale("en".to_string()), Locale("es".to_string())]
}

fn default_fallback() -> Locale {
    Locale("en".to_string())
}

fn default_cookie_name() -> String {
    "locale".to_string()
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            supported: default_supported(),
            fallback: default_fallback(),
            cookie_name: default_cookie_name(),
        }
    }
}

impl LocaleSettings {
    /// Checks that the fallback is one of the supported locales.
    ///
    /// # Errors
    ///
    /// Returns an error if no locale is supported or the fallback is not.
    pub fn validate(&self) -> Result<(), EdgeConfigError> {
        if self.supported.is_empty() {
            return Err(EdgeConfigError::NoSupportedLocales);
        }
        if !self.supported.contains(&self.fallback) {
            return Err(EdgeConfigError::UnsupportedFallback {
                locale: self.fallback.to_string(),
            });
        }
        Ok(())
    }

    /// Returns the supported locale written exactly as `segment`, if any.
    #[must_use]
    pub fn from_path_segment(&self, segment: &str) -> Option<&Locale> {
        self.supported.iter().find(|locale| locale.as_str() == segment)
    }

    /// Returns the supported locale matching a requested tag, exactly or by
    /// primary subtag.
    #[must_use]
    pub fn matching(&self, requested: &Locale) -> Option<&Locale> {
        self.supported
            .iter()
            .find(|locale| *locale == requested)
            .or_else(|| {
                self.supported
                    .iter()
                    .find(|locale| locale.primary() == requested.primary())
            })
    }

    /// Resolves the locale of a request. Always yields a supported locale.
    #[must_use]
    pub fn resolve(&self, cookie: Option<&str>, accept_language: Option<&str>) -> Locale {
        let from_cookie = cookie
            .and_then(|value| value.parse::<Locale>().ok())
            .filter(|locale| self.supported.contains(locale));
        if let Some(locale) = from_cookie {
            return locale;
        }

        accept_language
            .map(parse_accept_language)
            .unwrap_or_default()
            .iter()
            .find_map(|requested| self.matching(requested))
            .unwrap_or(&self.fallback)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale(tag: &str) -> Locale {
        tag.parse().expect("valid tag")
    }

    #[test]
    fn locale_parsing_lowercases_and_validates() {
        assert_eq!(locale("pt-BR").as_str(), "pt-br");
        assert_eq!(locale("pt-BR").primary(), "pt");
        assert!("".parse::<Locale>().is_err());
        assert!("en_US".parse::<Locale>().is_err());
        assert!("en-".parse::<Locale>().is_err());
    }

    #[test]
    fn accept_language_orders_by_weight() {
        let tags = parse_accept_language("fr;q=0.5, es-MX, en;q=0.8, *;q=0.1, de;q=0");
        assert_eq!(tags, vec![locale("es-mx"), locale("en"), locale("fr")]);
    }

    #[test]
    fn accept_language_keeps_header_order_on_ties() {
        let tags = parse_accept_language("de, fr");
        assert_eq!(tags, vec![locale("de"), locale("fr")]);
    }

    #[test]
    fn accept_language_skips_malformed_weights() {
        assert_eq!(parse_accept_language("es;q=abc, en"), vec![locale("en")]);
    }

    #[test]
    fn cookie_wins_over_header() {
        let settings = LocaleSettings::default();
        assert_eq!(settings.resolve(Some("es"), Some("en-US")), locale("es"));
    }

    #[test]
    fn unsupported_cookie_is_ignored() {
        let settings = LocaleSettings::default();
        assert_eq!(settings.resolve(Some("fr"), Some("es")), locale("es"));
    }

    #[test]
    fn header_matches_by_primary_subtag() {
        let settings = LocaleSettings::default();
        assert_eq!(settings.resolve(None, Some("fr-FR, es-AR;q=0.9")), locale("es"));
    }

    #[test]
    fn fallback_when_nothing_matches() {
        let settings = LocaleSettings::default();
        assert_eq!(settings.resolve(None, Some("ja")), locale("en"));
        assert_eq!(settings.resolve(None, None), locale("en"));
    }

    #[test]
    fn fallback_must_be_supported() {
        let settings = LocaleSettings {
            fallback: locale("fr"),
            ..LocaleSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(EdgeConfigError::UnsupportedFallback {
                locale: "fr".to_string()
            })
        );
        assert!(LocaleSettings::default().validate().is_ok());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: LocaleSettings =
            serde_json::from_str(r#"{"supported":["en","es","pt-BR"]}"#).expect("deserialize");
        assert_eq!(settings.supported.len(), 3);
        assert_eq!(settings.supported[2], locale("pt-br"));
        assert_eq!(settings.fallback, locale("en"));
        assert_eq!(settings.cookie_name, "locale");
    }
}
