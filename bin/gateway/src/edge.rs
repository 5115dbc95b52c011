//! Edge access-control layer.
//!
//! Runs the edge filter ahead of routing. Redirects are answered directly;
//! requests that pass through carry their resolved `Locale` as a request
//! extension. Every response stamps the locale preference cookie.

use axum::{
    extract::{Request, State},
    http::header::ACCEPT_LANGUAGE,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use bandstand_core::RequestId;
use bandstand_credentials::CredentialKind;
use bandstand_edge::EdgeRequest;
use std::sync::Arc;
use tracing::{Instrument, info_span};

use crate::auth::{AppState, cookies::locale_cookie};

/// Runs the edge filter inside a span carrying a fresh request id.
pub async fn edge_layer(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let span = info_span!(
        "request",
        request_id = %RequestId::new(),
        method = %request.method(),
        path = %request.uri().path(),
    );
    filter(state, jar, request, next).instrument(span).await
}

async fn filter(state: Arc<AppState>, jar: CookieJar, mut request: Request, next: Next) -> Response {
    let locale_cookie_name = &state.edge.settings().locales.cookie_name;
    let access_name = state.session.credentials.name_of(CredentialKind::Access);

    let decision = {
        let uri = request.uri();
        let accept_language = request
            .headers()
            .get(ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());
        state.edge.decide(&EdgeRequest {
            path: uri.path(),
            query: uri.query(),
            locale_cookie: jar.get(locale_cookie_name).map(Cookie::value),
            accept_language,
            access_token: jar.get(access_name).map(Cookie::value),
        })
    };

    let response = match decision.action.location() {
        None => {
            request.extensions_mut().insert(decision.locale.clone());
            next.run(request).await
        }
        Some(location) if decision.action.is_permanent() => {
            Redirect::permanent(location).into_response()
        }
        Some(location) => Redirect::temporary(location).into_response(),
    };

    let stamp = locale_cookie(
        locale_cookie_name,
        decision.locale.as_str(),
        state.cookies.secure,
        state.cookies.locale_max_age_days,
    );
    (CookieJar::new().add(stamp), response).into_response()
}
