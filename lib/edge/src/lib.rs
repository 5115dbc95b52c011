//! Edge access control for the bandstand marketplace applications.
//!
//! The edge filter runs ahead of every request and decides, synchronously
//! and without network access, whether the request passes through or is
//! redirected:
//! - to the canonical path when the path has repeated separators
//! - to the locale-prefixed path when the path has no locale prefix
//! - to the login surface when the route needs a signed-in user
//! - to the forbidden surface when the route is scoped to another role
//!
//! # Example
//!
//! ```
//! use bandstand_edge::{AppKind, EdgeAction, EdgeFilter, EdgeRequest, EdgeSettings, RouteTable};
//!
//! let filter = EdgeFilter::new(EdgeSettings::default(), RouteTable::builtin(AppKind::Client))
//!     .expect("default settings are consistent");
//!
//! let decision = filter.decide(&EdgeRequest {
//!     path: "/en/bookings",
//!     ..EdgeRequest::default()
//! });
//! assert_eq!(
//!     decision.action,
//!     EdgeAction::RedirectLogin {
//!         location: "/en/login?redirect_to=%2Fen%2Fbookings".to_string()
//!     }
//! );
//! assert_eq!(decision.locale.as_str(), "en");
//! ```

pub mod error;
pub mod filter;
pub mod locale;
pub mod path;
pub mod routes;

pub use error::EdgeConfigError;
pub use filter::{Decision, EdgeAction, EdgeFilter, EdgeRequest, EdgeSettings};
pub use locale::{Locale, LocaleSettings, parse_accept_language};
pub use path::{AssetPaths, normalize};
pub use routes::{AccessTier, AppKind, RoutePattern, RouteRule, RouteRuleConfig, RouteTable, TierName};
