//! Error types for the edge crate.
//!
//! Classifying a request never fails; only building a filter from
//! configuration can.

use std::fmt;

/// Errors from building an edge filter out of configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeConfigError {
    /// A locale tag is not a valid language tag.
    InvalidLocale { tag: String },
    /// No supported locale is configured.
    NoSupportedLocales,
    /// The fallback locale is not one of the supported locales.
    UnsupportedFallback { locale: String },
    /// A route pattern could not be parsed.
    InvalidPattern { pattern: String, reason: String },
    /// A role-scoped route names no role.
    MissingRole { pattern: String },
    /// A route that is not role-scoped names a role.
    UnexpectedRole { pattern: String },
}

impl fmt::Display for EdgeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLocale { tag } => write!(f, "invalid locale tag: {tag}"),
            Self::NoSupportedLocales => write!(f, "no supported locales configured"),
            Self::UnsupportedFallback { locale } => {
                write!(f, "fallback locale '{locale}' is not supported")
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid route pattern '{pattern}': {reason}")
            }
            Self::MissingRole { pattern } => {
                write!(f, "role-scoped route '{pattern}' names no role")
            }
            Self::UnexpectedRole { pattern } => {
                write!(f, "route '{pattern}' names a role but is not role-scoped")
            }
        }
    }
}

impl std::error::Error for EdgeConfigError {}
