//! Request path handling ahead of classification.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Collapses repeated `/` separators.
///
/// Returns the input unchanged (borrowed) when it is already canonical.
#[must_use]
pub fn normalize(path: &str) -> Cow<'_, str> {
    if !path.contains("//") {
        return Cow::Borrowed(path);
    }
    let mut normalized = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        normalized.push(c);
    }
    Cow::Owned(normalized)
}

/// Appends a query string, if any, to a path.
#[must_use]
pub fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_string(),
    }
}

/// Paths that are served as-is: never locale-prefixed, never classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetPaths {
    prefixes: Vec<String>,
}

impl AssetPaths {
    #[must_use]
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Returns true for paths under a configured prefix.
    #[must_use]
    pub fn is_asset(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Returns true if the last segment of `path` looks like a file name.
///
/// Only meaningful for paths outside any locale: under a locale prefix a
/// dotted segment is just as likely to be a record id.
#[must_use]
pub fn looks_like_file(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|last| last.contains('.'))
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self::new(
            ["/static", "/api", "/_next", "/favicon.ico", "/robots.txt"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Splits the first segment off a path.
///
/// Returns the segment and the remainder, which always starts with `/`.
#[must_use]
pub fn split_first_segment(path: &str) -> (&str, &str) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.find('/') {
        Some(index) => (&trimmed[..index], &trimmed[index..]),
        None => (trimmed, "/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_repeated_separators() {
        assert_eq!(normalize("/en//bookings"), "/en/bookings");
        assert_eq!(normalize("///en///a//b/"), "/en/a/b/");
        assert!(matches!(normalize("/en/bookings"), Cow::Borrowed(_)));
    }

    #[test]
    fn with_query_skips_empty_query() {
        assert_eq!(with_query("/en", Some("a=1")), "/en?a=1");
        assert_eq!(with_query("/en", Some("")), "/en");
        assert_eq!(with_query("/en", None), "/en");
    }

    #[test]
    fn asset_prefixes_match_on_segment_boundary() {
        let assets = AssetPaths::default();
        assert!(assets.is_asset("/static/app.css"));
        assert!(assets.is_asset("/api/session"));
        assert!(assets.is_asset("/favicon.ico"));
        assert!(!assets.is_asset("/apiary"));
        assert!(!assets.is_asset("/en/bookings"));
    }

    #[test]
    fn file_like_last_segment() {
        assert!(looks_like_file("/images/logo.png"));
        assert!(looks_like_file("/en/bookings/42.v2"));
        assert!(!looks_like_file("/v1.2/bookings"));
    }

    #[test]
    fn split_first_segment_keeps_leading_slash_on_rest() {
        assert_eq!(split_first_segment("/en/bookings/42"), ("en", "/bookings/42"));
        assert_eq!(split_first_segment("/en"), ("en", "/"));
        assert_eq!(split_first_segment("/"), ("", "/"));
    }
}
