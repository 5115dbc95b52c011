//! Session handling for the gateway server.
//!
//! This module provides:
//! - Shared application state (`AppState`)
//! - The per-request session layer that seeds a cookie jar from the browser's
//!   credentials and replays credential changes onto the response
//! - Extractors for the current identity
//! - JSON routes for login, federated sign-in, logout and renewal
//!
//! # Session model
//!
//! The gateway keeps no session state of its own. Each request builds a
//! `SessionGateway` around the cookies it carries; everything the remote API
//! issues during the request is written back as `Set-Cookie` headers.
//! Renewals are coalesced across requests through a shared `RenewalFlights`
//! registry, so parallel requests carrying the same refresh credential
//! trigger a single call to the renewal endpoint.

pub mod cookies;
pub mod middleware;
pub mod routes;

use bandstand_credentials::CookieJarStore;
use bandstand_edge::{EdgeFilter, RouteTable};
use bandstand_session::{ApiTransport, HttpTransport, RenewalFlights, SessionGateway, SessionSettings};
use rootcause::prelude::Report;
use std::sync::Arc;

use crate::config::{CookieConfig, GatewayConfig};
use crate::error::StartupError;

pub use middleware::{CurrentSession, OptionalUser, RequireBand, RequireClient, RequireUser, Session};

/// Shared application state.
pub struct AppState {
    transport: Arc<dyn ApiTransport>,
    flights: Arc<RenewalFlights>,
    /// Session settings handed to every per-request gateway.
    pub session: SessionSettings,
    /// Cookie configuration.
    pub cookies: CookieConfig,
    /// Edge access-control filter.
    pub edge: EdgeFilter,
    /// Directory served under `/static`.
    pub static_dir: String,
}

impl AppState {
    /// Creates application state around an existing transport.
    ///
    /// The configured route rules replace the built-in table for the
    /// configured application when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the route rules or edge settings are invalid.
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        config: &GatewayConfig,
    ) -> Result<Self, Report<StartupError>> {
        let routes = match &config.routes {
            Some(rules) => RouteTable::from_config(rules.clone()).map_err(|e| {
                StartupError::InvalidRoutes {
                    reason: e.to_string(),
                }
            })?,
            None => RouteTable::builtin(config.app),
        };
        let edge = EdgeFilter::new(config.edge.clone(), routes).map_err(|e| {
            StartupError::InvalidEdge {
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            transport,
            flights: Arc::new(RenewalFlights::new()),
            session: config.session.clone(),
            cookies: config.cookies.clone(),
            edge,
            static_dir: config.static_dir.clone(),
        })
    }

    /// Creates application state talking to the configured remote API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the
    /// configuration is invalid.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, Report<StartupError>> {
        let transport = HttpTransport::new(config.api.base_url.clone(), config.api.timeout())
            .map_err(|e| StartupError::ApiClient {
                reason: e.to_string(),
            })?;
        Self::new(Arc::new(transport), config)
    }

    /// Builds a session gateway for one request's cookie jar.
    #[must_use]
    pub fn gateway_for(&self, store: Arc<CookieJarStore>) -> SessionGateway {
        SessionGateway::with_flights(
            Arc::clone(&self.transport),
            store,
            self.session.clone(),
            Arc::clone(&self.flights),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use bandstand_core::Role;
    use bandstand_edge::{AccessTier, AppKind, RouteRuleConfig, TierName};

    #[test]
    fn builtin_routes_follow_the_configured_app() {
        let config = GatewayConfig {
            app: AppKind::Band,
            ..crate::testing::config()
        };
        let state = AppState::new(Arc::new(FakeApi::new()), &config).expect("state");
        assert_eq!(
            state.edge.routes().classify("/dashboard/stats"),
            AccessTier::Role(Role::Band)
        );
    }

    #[test]
    fn configured_routes_replace_builtin_table() {
        let config = GatewayConfig {
            routes: Some(vec![RouteRuleConfig {
                pattern: "/vip/**".to_string(),
                tier: TierName::ProtectedRole,
                role: Some(Role::Client),
            }]),
            ..crate::testing::config()
        };
        let state = AppState::new(Arc::new(FakeApi::new()), &config).expect("state");
        assert_eq!(
            state.edge.routes().classify("/vip/lounge"),
            AccessTier::Role(Role::Client)
        );
    }

    #[test]
    fn invalid_route_rule_fails_startup() {
        let config = GatewayConfig {
            routes: Some(vec![RouteRuleConfig {
                pattern: "/vip/**".to_string(),
                tier: TierName::ProtectedRole,
                role: None,
            }]),
            ..crate::testing::config()
        };
        assert!(AppState::new(Arc::new(FakeApi::new()), &config).is_err());
    }
}
