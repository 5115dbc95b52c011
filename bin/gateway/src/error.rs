//! Error types for the gateway server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bandstand_session::SessionError;
use rootcause::prelude::Report;
use std::fmt;

/// Errors that prevent the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// The HTTP client for the remote API could not be built.
    ApiClient { reason: String },
    /// A configured route rule is invalid.
    InvalidRoutes { reason: String },
    /// The edge filter settings are inconsistent.
    InvalidEdge { reason: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiClient { reason } => write!(f, "failed to create API client: {reason}"),
            Self::InvalidRoutes { reason } => write!(f, "invalid route table: {reason}"),
            Self::InvalidEdge { reason } => write!(f, "invalid edge settings: {reason}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// A session operation failed in a way the browser cannot fix.
///
/// The details are logged; the response only says the upstream failed.
#[derive(Debug)]
pub struct ApiRejection(pub Report<SessionError>);

impl From<Report<SessionError>> for ApiRejection {
    fn from(report: Report<SessionError>) -> Self {
        Self(report)
    }
}

impl IntoResponse for ApiRejection {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "session operation failed");
        (StatusCode::BAD_GATEWAY, "Upstream API unavailable").into_response()
    }
}
