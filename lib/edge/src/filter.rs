//! The per-request access decision.
//!
//! Each request goes through these steps, the first terminal one winning:
//! 1. Resolve the locale (cookie, `Accept-Language`, fallback)
//! 2. Redirect to the normalized path if the path has repeated separators
//! 3. Pass internal asset paths through untouched
//! 4. Redirect paths without a locale prefix to the prefixed path
//! 5. Classify the rest of the path and check the access credential's role
//!
//! The filter decodes the access credential but never verifies or renews
//! it; a credential that does not decode counts as absent.

use bandstand_core::{AccessClaims, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::form_urlencoded;

use crate::error::EdgeConfigError;
use crate::locale::{Locale, LocaleSettings};
use crate::path::{AssetPaths, looks_like_file, normalize, split_first_segment, with_query};
use crate::routes::{AccessTier, RouteTable};

/// What the filter sees of a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeRequest<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub locale_cookie: Option<&'a str>,
    pub accept_language: Option<&'a str>,
    pub access_token: Option<&'a str>,
}

/// Terminal outcome of the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeAction {
    PassThrough,
    /// The path had repeated separators.
    RedirectNormalized { location: String },
    /// The path had no locale prefix.
    RedirectLocalized { location: String },
    /// The route needs a signed-in user and there is none.
    RedirectLogin { location: String },
    /// The route is scoped to a role the user does not have.
    RedirectForbidden { location: String },
}

impl EdgeAction {
    /// Returns the redirect target, if the action is a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::PassThrough => None,
            Self::RedirectNormalized { location }
            | Self::RedirectLocalized { location }
            | Self::RedirectLogin { location }
            | Self::RedirectForbidden { location } => Some(location),
        }
    }

    /// Returns true for redirects that should be cached by clients.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::RedirectNormalized { .. })
    }
}

impl fmt::Display for EdgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => write!(f, "pass-through"),
            Self::RedirectNormalized { location } => write!(f, "redirect-normalized {location}"),
            Self::RedirectLocalized { location } => write!(f, "redirect-localized {location}"),
            Self::RedirectLogin { location } => write!(f, "redirect-login {location}"),
            Self::RedirectForbidden { location } => write!(f, "redirect-forbidden {location}"),
        }
    }
}

/// The filter's answer for one request.
///
/// The locale is carried on every decision so that it can be stamped as a
/// cookie on whatever response follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub locale: Locale,
    pub action: EdgeAction,
}

/// Edge filter settings, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSettings {
    #[serde(default)]
    pub locales: LocaleSettings,

    #[serde(default)]
    pub asset_paths: AssetPaths,

    /// Login surface, relative to the locale prefix.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Forbidden surface, relative to the locale prefix.
    #[serde(default = "default_forbidden_path")]
    pub forbidden_path: String,

    /// Query parameter carrying the return-to path on login redirects.
    #[serde(default = "default_redirect_param")]
    pub redirect_param: String,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_forbidden_path() -> String {
    "/forbidden".to_string()
}

fn default_redirect_param() -> String {
    "redirect_to".to_string()
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            locales: LocaleSettings::default(),
            asset_paths: AssetPaths::default(),
            login_path: default_login_path(),
            forbidden_path: default_forbidden_path(),
            redirect_param: default_redirect_param(),
        }
    }
}

/// Classifies requests ahead of application code.
#[derive(Debug, Clone)]
pub struct EdgeFilter {
    settings: EdgeSettings,
    routes: RouteTable,
}

impl EdgeFilter {
    /// Creates a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the locale settings are inconsistent.
    pub fn new(settings: EdgeSettings, routes: RouteTable) -> Result<Self, EdgeConfigError> {
        settings.locales.validate()?;
        Ok(Self { settings, routes })
    }

    #[must_use]
    pub fn settings(&self) -> &EdgeSettings {
        &self.settings
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decides what happens to a request. Never fails.
    #[must_use]
    pub fn decide(&self, request: &EdgeRequest<'_>) -> Decision {
        let resolved = self
            .settings
            .locales
            .resolve(request.locale_cookie, request.accept_language);
        let (locale, action) = self.route(request, resolved);
        debug!(path = %request.path, locale = %locale, action = %action, "edge decision");
        Decision { locale, action }
    }

    fn route(&self, request: &EdgeRequest<'_>, resolved: Locale) -> (Locale, EdgeAction) {
        let path = request.path;

        let normalized = normalize(path);
        if normalized != path {
            let location = with_query(&normalized, request.query);
            return (resolved, EdgeAction::RedirectNormalized { location });
        }

        if self.settings.asset_paths.is_asset(path) {
            return (resolved, EdgeAction::PassThrough);
        }

        let (first, rest) = split_first_segment(path);
        let Some(prefix) = self.settings.locales.from_path_segment(first) else {
            if looks_like_file(path) {
                return (resolved, EdgeAction::PassThrough);
            }
            let localized = format!("/{resolved}{}", path.trim_end_matches('/'));
            let location = with_query(&localized, request.query);
            return (resolved, EdgeAction::RedirectLocalized { location });
        };
        // An explicit prefix is what the user navigated to; it becomes the
        // stamped preference.
        let locale = prefix.clone();

        if self.is_surface(rest) {
            return (locale, EdgeAction::PassThrough);
        }

        let action = match self.routes.classify(rest) {
            AccessTier::Public => EdgeAction::PassThrough,
            AccessTier::Authenticated => match self.role_of(request.access_token) {
                Some(_) => EdgeAction::PassThrough,
                None => self.login_redirect(&locale, request),
            },
            AccessTier::Role(required) => match self.role_of(request.access_token) {
                Some(role) if role == required => EdgeAction::PassThrough,
                Some(_) => EdgeAction::RedirectForbidden {
                    location: format!("/{locale}{}", self.settings.forbidden_path),
                },
                None => self.login_redirect(&locale, request),
            },
        };
        (locale, action)
    }

    /// The login and forbidden surfaces are always reachable.
    fn is_surface(&self, rest: &str) -> bool {
        let rest = match rest.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        rest == self.settings.login_path || rest == self.settings.forbidden_path
    }

    fn role_of(&self, access_token: Option<&str>) -> Option<Role> {
        let token = access_token?;
        match AccessClaims::decode(token) {
            Ok(claims) => Some(claims.role()),
            Err(e) => {
                debug!(error = %e, "access credential not usable at the edge");
                None
            }
        }
    }

    fn login_redirect(&self, locale: &Locale, request: &EdgeRequest<'_>) -> EdgeAction {
        let return_to = with_query(request.path, request.query);
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.settings.redirect_param, &return_to)
            .finish();
        EdgeAction::RedirectLogin {
            location: format!("/{locale}{}?{query}", self.settings.login_path),
        }
    }
}
