//! Route classification.
//!
//! A route table is a typed list of `(pattern, tier)` rules evaluated by a
//! single matcher. Paths are classified after the locale prefix has been
//! stripped; a path no rule matches is public.

use bandstand_core::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EdgeConfigError;

/// Who may reach a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessTier {
    Public,
    /// Any signed-in user.
    Authenticated,
    /// Signed-in users with exactly this role.
    Role(Role),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` or `:name`: exactly one segment.
    Any,
    /// Trailing `**`: zero or more segments.
    Rest,
}

/// A parsed route pattern such as `/bands/*/edit` or `/chat/**`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

/// Orders matching patterns; greater is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Specificity {
    literals: usize,
    fewer_wildcards: std::cmp::Reverse<usize>,
    bounded: bool,
}

impl RoutePattern {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern matches a normalized path.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut index = 0;
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Any if index < parts.len() => {}
                Segment::Literal(literal) if parts.get(index) == Some(&literal.as_str()) => {}
                Segment::Any | Segment::Literal(_) => return false,
            }
            index += 1;
        }
        index == parts.len()
    }

    fn specificity(&self) -> Specificity {
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        Specificity {
            literals,
            fewer_wildcards: std::cmp::Reverse(self.segments.len() - literals),
            bounded: !self.segments.contains(&Segment::Rest),
        }
    }
}

impl FromStr for RoutePattern {
    type Err = EdgeConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| EdgeConfigError::InvalidPattern {
            pattern: s.to_string(),
            reason: reason.to_string(),
        };

        if !s.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        let raw: Vec<&str> = s.split('/').filter(|part| !part.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (position, part) in raw.iter().enumerate() {
            let segment = match *part {
                "**" if position + 1 == raw.len() => Segment::Rest,
                "**" => return Err(invalid("'**' is only allowed as the last segment")),
                "*" => Segment::Any,
                p if p.starts_with(':') && p.len() > 1 => Segment::Any,
                p if p.contains('*') => return Err(invalid("'*' must be a whole segment")),
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self {
            source: s.to_string(),
            segments,
        })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Tier names used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierName {
    Public,
    ProtectedCommon,
    ProtectedRole,
}

/// A route rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRuleConfig {
    pub pattern: String,
    pub tier: TierName,
    #[serde(default)]
    pub role: Option<Role>,
}

/// A classified route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub pattern: RoutePattern,
    pub tier: AccessTier,
}

impl RouteRule {
    /// Creates a rule from a pattern string.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid.
    pub fn new(pattern: &str, tier: AccessTier) -> Result<Self, EdgeConfigError> {
        Ok(Self {
            pattern: pattern.parse()?,
            tier,
        })
    }
}

impl TryFrom<RouteRuleConfig> for RouteRule {
    type Error = EdgeConfigError;

    fn try_from(config: RouteRuleConfig) -> Result<Self, Self::Error> {
        let tier = match (config.tier, config.role) {
            (TierName::ProtectedRole, Some(role)) => AccessTier::Role(role),
            (TierName::ProtectedRole, None) => {
                return Err(EdgeConfigError::MissingRole {
                    pattern: config.pattern,
                });
            }
            (_, Some(_)) => {
                return Err(EdgeConfigError::UnexpectedRole {
                    pattern: config.pattern,
                });
            }
            (TierName::Public, None) => AccessTier::Public,
            (TierName::ProtectedCommon, None) => AccessTier::Authenticated,
        };
        Self::new(&config.pattern, tier)
    }
}

/// The application a gateway fronts; selects a built-in route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    #[default]
    Marketing,
    Auth,
    Client,
    Band,
}

impl AppKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Marketing => "marketing",
            Self::Auth => "auth",
            Self::Client => "client",
            Self::Band => "band",
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered route rules with a single matcher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    #[must_use]
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Builds a table from configured rules.
    ///
    /// # Errors
    ///
    /// Returns the first invalid rule.
    pub fn from_config(rules: Vec<RouteRuleConfig>) -> Result<Self, EdgeConfigError> {
        rules
            .into_iter()
            .map(RouteRule::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Returns the built-in table of an application.
    #[must_use]
    pub fn builtin(app: AppKind) -> Self {
        use AccessTier::{Authenticated, Public};

        let client = AccessTier::Role(Role::Client);
        let band = AccessTier::Role(Role::Band);
        let rules: Vec<(&str, AccessTier)> = match app {
            AppKind::Marketing => vec![("/**", Public)],
            AppKind::Auth => vec![
                ("/login", Public),
                ("/register", Public),
                ("/forgot-password", Public),
                ("/reset-password/*", Public),
                ("/verify-email/*", Public),
                ("/account/**", Authenticated),
            ],
            AppKind::Client => vec![
                ("/", Public),
                ("/login", Public),
                ("/forbidden", Public),
                ("/bands/**", Public),
                ("/profile", Authenticated),
                ("/chat/**", Authenticated),
                ("/notifications", Authenticated),
                ("/bookings/**", client),
                ("/offers/**", client),
            ],
            AppKind::Band => vec![
                ("/", Public),
                ("/login", Public),
                ("/forbidden", Public),
                ("/profile", Authenticated),
                ("/chat/**", Authenticated),
                ("/notifications", Authenticated),
                ("/dashboard/**", band),
                ("/calendar/**", band),
                ("/bands/*/edit", band),
                ("/requests/**", band),
            ],
        };

        Self::new(
            rules
                .into_iter()
                .filter_map(|(pattern, tier)| RouteRule::new(pattern, tier).ok())
                .collect(),
        )
    }

    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Returns the most specific rule matching a path.
    ///
    /// Ties go to the rule declared first.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&RouteRule> {
        let mut best: Option<(&RouteRule, Specificity)> = None;
        for rule in self.rules.iter().filter(|rule| rule.pattern.matches(path)) {
            let specificity = rule.pattern.specificity();
            if best.is_none_or(|(_, current)| specificity > current) {
                best = Some((rule, specificity));
            }
        }
        best.map(|(rule, _)| rule)
    }

    /// Classifies a path. Unmatched paths are public.
    #[must_use]
    pub fn classify(&self, path: &str) -> AccessTier {
        self.find(path).map_or(AccessTier::Public, |rule| rule.tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> RoutePattern {
        s.parse().expect("valid pattern")
    }

    #[test]
    fn literal_patterns_match_exactly() {
        assert!(pattern("/profile").matches("/profile"));
        assert!(pattern("/profile").matches("/profile/"));
        assert!(!pattern("/profile").matches("/profile/edit"));
        assert!(!pattern("/profile").matches("/Profile"));
        assert!(pattern("/").matches("/"));
        assert!(!pattern("/").matches("/profile"));
    }

    #[test]
    fn single_wildcards_match_one_segment() {
        assert!(pattern("/bands/*/edit").matches("/bands/42/edit"));
        assert!(pattern("/bands/:id/edit").matches("/bands/42/edit"));
        assert!(!pattern("/bands/*/edit").matches("/bands/edit"));
        assert!(!pattern("/reset-password/*").matches("/reset-password"));
    }

    #[test]
    fn trailing_rest_matches_zero_or_more_segments() {
        assert!(pattern("/chat/**").matches("/chat"));
        assert!(pattern("/chat/**").matches("/chat/7/messages"));
        assert!(!pattern("/chat/**").matches("/chatter"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!("profile".parse::<RoutePattern>().is_err());
        assert!("/a/**/b".parse::<RoutePattern>().is_err());
        assert!("/a/b*".parse::<RoutePattern>().is_err());
    }

    #[test]
    fn unmatched_paths_are_public() {
        let table = RouteTable::builtin(AppKind::Client);
        assert_eq!(table.classify("/about"), AccessTier::Public);
    }

    #[test]
    fn literal_match_wins_over_wildcard() {
        let table = RouteTable::new(vec![
            RouteRule::new("/bands/**", AccessTier::Public).expect("rule"),
            RouteRule::new("/bands/*/edit", AccessTier::Role(Role::Band)).expect("rule"),
            RouteRule::new("/bands/new/edit", AccessTier::Authenticated).expect("rule"),
        ]);
        assert_eq!(table.classify("/bands/new/edit"), AccessTier::Authenticated);
        assert_eq!(table.classify("/bands/42/edit"), AccessTier::Role(Role::Band));
        assert_eq!(table.classify("/bands/42"), AccessTier::Public);
    }

    #[test]
    fn ties_go_to_first_declared_rule() {
        let table = RouteTable::new(vec![
            RouteRule::new("/x/:a", AccessTier::Authenticated).expect("rule"),
            RouteRule::new("/x/*", AccessTier::Public).expect("rule"),
        ]);
        assert_eq!(table.classify("/x/1"), AccessTier::Authenticated);
    }

    #[test]
    fn builtin_tables_are_complete() {
        assert_eq!(RouteTable::builtin(AppKind::Marketing).rules().len(), 1);
        assert_eq!(RouteTable::builtin(AppKind::Auth).rules().len(), 6);
        assert_eq!(RouteTable::builtin(AppKind::Client).rules().len(), 9);
        assert_eq!(RouteTable::builtin(AppKind::Band).rules().len(), 10);
    }

    #[test]
    fn builtin_band_table_scopes_management_to_bands() {
        let table = RouteTable::builtin(AppKind::Band);
        assert_eq!(table.classify("/dashboard"), AccessTier::Role(Role::Band));
        assert_eq!(table.classify("/bands/9/edit"), AccessTier::Role(Role::Band));
        assert_eq!(table.classify("/chat/3"), AccessTier::Authenticated);
    }

    #[test]
    fn configured_rules_require_role_only_when_role_scoped() {
        let missing = RouteRuleConfig {
            pattern: "/a".to_string(),
            tier: TierName::ProtectedRole,
            role: None,
        };
        assert!(matches!(
            RouteRule::try_from(missing),
            Err(EdgeConfigError::MissingRole { .. })
        ));

        let unexpected = RouteRuleConfig {
            pattern: "/a".to_string(),
            tier: TierName::Public,
            role: Some(Role::Band),
        };
        assert!(matches!(
            RouteRule::try_from(unexpected),
            Err(EdgeConfigError::UnexpectedRole { .. })
        ));

        let table = RouteTable::from_config(vec![RouteRuleConfig {
            pattern: "/bookings/**".to_string(),
            tier: TierName::ProtectedRole,
            role: Some(Role::Client),
        }])
        .expect("table");
        assert_eq!(table.classify("/bookings/1"), AccessTier::Role(Role::Client));
    }
}
