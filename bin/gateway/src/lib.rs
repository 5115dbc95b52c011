//! Session gateway server for the bandstand marketplace applications.
//!
//! The router is layered as follows, outermost first:
//! - `edge::edge_layer`: locale prefixing, path normalization and route
//!   access control, decided from the request alone
//! - `/static`: files served as-is, outside the session layer
//! - `auth::middleware::session_layer`: per-request credential jar and
//!   session gateway
//! - JSON routes under `/api` and the page fallback

pub mod auth;
pub mod config;
pub mod edge;
pub mod error;
pub mod pages;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;

use auth::{AppState, middleware::session_layer, routes};
use edge::edge_layer;

/// Builds the gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    let forbidden_page = format!("/{{locale}}{}", state.edge.settings().forbidden_path);
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/api/auth/login", post(routes::login))
        .route("/api/auth/federated/{provider}", post(routes::federated_sign_in))
        .route("/api/auth/logout", post(routes::logout))
        .route("/api/auth/refresh", post(routes::refresh))
        .route("/api/session", get(routes::session))
        .route("/api/me", get(routes::me))
        .route("/api/client/{*path}", get(routes::client_api))
        .route("/api/band/{*path}", get(routes::band_api))
        .route(&forbidden_page, get(pages::forbidden))
        .fallback(pages::page)
        .layer(from_fn_with_state(Arc::clone(&state), session_layer))
        .nest_service("/static", static_files)
        .layer(from_fn_with_state(state, edge_layer))
}
