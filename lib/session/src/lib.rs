//! Session handling for the bandstand marketplace applications.
//!
//! This crate provides the client half of the session gateway:
//! - `ApiTransport`: the seam to the remote REST API, with a `reqwest` implementation
//! - `AuthenticatedExecutor`: attaches the access credential and retries once on `401`
//! - `TokenRefresher`: renews the access credential, coalescing concurrent renewals
//! - `SessionGateway`: login, federated sign-in and logout
//! - `SessionContext`: the per-navigation answer to "who is the current user"
//!
//! # Renewal model
//!
//! The access credential is short-lived. When an API call fails with `401`,
//! the executor asks the refresher for a new access credential and retries the
//! call exactly once. A failed renewal deletes the refresh credential, which
//! ends the session: the next identity check reads as anonymous.

pub mod auth;
pub mod context;
pub mod error;
pub mod executor;
pub mod refresh;
pub mod settings;
pub mod transport;

pub use auth::{LoginOutcome, LogoutOutcome, SessionGateway, SessionLength};
pub use context::{CurrentUser, Identity, SessionContext};
pub use error::{ApiError, ExecuteError, RefreshError, SessionError, TransportError};
pub use executor::{Attempt, AuthenticatedExecutor};
pub use refresh::{RenewalFlights, TokenRefresher};
pub use settings::{IdentityEndpoint, SessionSettings};
pub use transport::{ApiRequest, ApiResponse, ApiTransport, HttpTransport};

#[cfg(test)]
pub(crate) mod testing;
