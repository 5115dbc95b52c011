//! Session layer and identity extractors for Axum.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use bandstand_core::Role;
use bandstand_credentials::{CookieJarStore, CredentialKind};
use bandstand_session::{CurrentUser, SessionContext, SessionGateway};
use std::sync::Arc;
use tracing::{debug, error};

use super::{AppState, cookies::changes_jar};

/// Attaches a per-request `SessionGateway` and replays the credential
/// changes it made onto the response.
///
/// Only the access and refresh cookies are copied into the gateway's jar.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let names = &state.session.credentials;
    let seeded: Vec<(String, String)> = [CredentialKind::Access, CredentialKind::Refresh]
        .into_iter()
        .filter_map(|kind| {
            let name = names.name_of(kind);
            jar.get(name)
                .map(|cookie| (name.to_string(), cookie.value().to_string()))
        })
        .collect();
    let store = Arc::new(CookieJarStore::from_request_cookies(seeded));
    let gateway = Arc::new(state.gateway_for(Arc::clone(&store)));
    request.extensions_mut().insert(gateway);

    let response = next.run(request).await;

    let changes = store.take_changes();
    if changes.is_empty() {
        return response;
    }
    debug!(count = changes.len(), "replaying credential changes");
    (changes_jar(changes, state.cookies.secure), response).into_response()
}

/// Extractor for the request's session gateway.
pub struct Session(pub Arc<SessionGateway>);

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<SessionGateway>>()
            .cloned()
            .map(Session)
            .ok_or(AuthRejection::MissingSessionLayer)
    }
}

/// Extractor for the request's resolved identity.
///
/// The identity is resolved on first use and shared by later extractors of
/// the same request.
pub struct CurrentSession(pub Arc<SessionContext>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<Arc<SessionContext>>() {
            return Ok(CurrentSession(Arc::clone(context)));
        }

        let Session(gateway) = Session::from_request_parts(parts, state).await?;
        let context = SessionContext::load(&gateway).await.map_err(|e| {
            error!(error = ?e, "failed to resolve session identity");
            AuthRejection::Unavailable
        })?;
        let context = Arc::new(context);
        parts.extensions.insert(Arc::clone(&context));
        Ok(CurrentSession(context))
    }
}

/// Extractor for requiring a signed-in user.
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(context) = CurrentSession::from_request_parts(parts, state).await?;
        context
            .user()
            .cloned()
            .map(RequireUser)
            .ok_or(AuthRejection::NotAuthenticated)
    }
}

/// Extractor for optionally getting the signed-in user.
///
/// Returns None if the user is not signed in or the identity cannot be
/// resolved.
pub struct OptionalUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match RequireUser::from_request_parts(parts, state).await {
            Ok(RequireUser(user)) => Ok(OptionalUser(Some(user))),
            Err(_) => Ok(OptionalUser(None)),
        }
    }
}

async fn require_role<S>(parts: &mut Parts, state: &S, role: Role) -> Result<CurrentUser, AuthRejection>
where
    S: Send + Sync,
{
    let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
    if user.role != role {
        return Err(AuthRejection::Forbidden { required: role });
    }
    Ok(user)
}

/// Extractor for requiring a signed-in client.
pub struct RequireClient(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireClient
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Client).await.map(RequireClient)
    }
}

/// Extractor for requiring a signed-in band.
pub struct RequireBand(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireBand
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Band).await.map(RequireBand)
    }
}

/// Rejection type for session extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    Forbidden { required: Role },
    Unavailable,
    MissingSessionLayer,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => (StatusCode::UNAUTHORIZED, "Not signed in").into_response(),
            Self::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                format!("Requires the {required} role"),
            )
                .into_response(),
            Self::Unavailable => {
                (StatusCode::BAD_GATEWAY, "Upstream API unavailable").into_response()
            }
            Self::MissingSessionLayer => {
                error!("session extractor used on a route without the session layer");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
