//! Error types for the credentials crate.

use std::fmt;

/// Errors from parsing a `Set-Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetCookieError {
    /// The header is empty or whitespace only.
    Empty,
    /// The first segment is not a `name=value` pair.
    MissingNameValue { segment: String },
    /// The cookie name is empty.
    EmptyName,
}

impl fmt::Display for SetCookieError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty set-cookie header"),
            Self::MissingNameValue { segment } => {
                write!(f, "expected name=value, found '{segment}'")
            }
            Self::EmptyName => write!(f, "cookie name is empty"),
        }
    }
}

impl std::error::Error for SetCookieError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_value_display() {
        let err = SetCookieError::MissingNameValue {
            segment: "HttpOnly".to_string(),
        };
        assert!(err.to_string().contains("name=value"));
        assert!(err.to_string().contains("HttpOnly"));
    }
}
