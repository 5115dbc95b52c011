//! JSON routes for signing in and out, and for authenticated API calls.

use axum::{
    Json,
    extract::Path,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bandstand_session::{
    ApiError, ApiRequest, ExecuteError, LoginOutcome, LogoutOutcome, SessionGateway,
    SessionLength,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::middleware::{CurrentSession, RequireBand, RequireClient, RequireUser, Session};
use crate::error::ApiRejection;

/// Body of a password login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    email: String,
    password: String,
    #[serde(default)]
    remember_me: bool,
}

/// Body of a federated sign-in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRequest {
    id_token: String,
    #[serde(default)]
    remember_me: bool,
}

fn session_length(remember_me: bool) -> SessionLength {
    if remember_me {
        SessionLength::Remembered
    } else {
        SessionLength::Session
    }
}

fn login_response(outcome: LoginOutcome) -> Response {
    match outcome {
        LoginOutcome::SignedIn => Json(json!({ "status": "signed_in" })).into_response(),
        LoginOutcome::Rejected { status } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "rejected", "upstreamStatus": status.as_u16() })),
        )
            .into_response(),
    }
}

/// Signs in with email and password.
pub async fn login(
    Session(gateway): Session,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiRejection> {
    let outcome = gateway
        .login(&body.email, &body.password, session_length(body.remember_me))
        .await?;
    Ok(login_response(outcome))
}

/// Signs in with an ID token from a federated identity provider.
pub async fn federated_sign_in(
    Session(gateway): Session,
    Path(provider): Path<String>,
    Json(body): Json<FederatedRequest>,
) -> Result<Response, ApiRejection> {
    let outcome = gateway
        .federated_sign_in(&provider, &body.id_token, session_length(body.remember_me))
        .await?;
    Ok(login_response(outcome))
}

/// Ends the session. Always succeeds locally.
pub async fn logout(Session(gateway): Session) -> impl IntoResponse {
    let outcome = match gateway.logout().await {
        LogoutOutcome::Revoked => "revoked",
        LogoutOutcome::NothingToRevoke => "nothing_to_revoke",
        LogoutOutcome::RemoteFailed => "remote_failed",
    };
    Json(json!({ "status": "signed_out", "revocation": outcome }))
}

/// Renews the access credential on request.
pub async fn refresh(Session(gateway): Session) -> Response {
    match gateway.refresher().refresh().await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "explicit renewal failed");
            (StatusCode::UNAUTHORIZED, "Session expired").into_response()
        }
    }
}

/// Returns the current identity.
pub async fn session(CurrentSession(context): CurrentSession) -> impl IntoResponse {
    Json(context.as_ref().clone())
}

/// Returns the signed-in user.
pub async fn me(RequireUser(user): RequireUser) -> impl IntoResponse {
    Json(user)
}

/// Forwards a read to the client API on behalf of a signed-in client.
pub async fn client_api(
    RequireClient(_): RequireClient,
    Session(gateway): Session,
    Path(path): Path<String>,
) -> Response {
    forward(&gateway, "/client", &path).await
}

/// Forwards a read to the band API on behalf of a signed-in band.
pub async fn band_api(
    RequireBand(_): RequireBand,
    Session(gateway): Session,
    Path(path): Path<String>,
) -> Response {
    forward(&gateway, "/band", &path).await
}

/// Joins a captured path onto `scope`, refusing anything that could leave it.
///
/// The capture is already percent-decoded, so an encoded `..%2F` shows up
/// here as a plain `..` segment.
fn scoped_path(scope: &str, path: &str) -> Option<String> {
    let escapes = path.split('/').any(|segment| {
        matches!(segment, "" | "." | "..") || segment.contains(['?', '#', '\\'])
    });
    (!escapes).then(|| format!("{scope}/{path}"))
}

async fn forward(gateway: &SessionGateway, scope: &str, path: &str) -> Response {
    let Some(target) = scoped_path(scope, path) else {
        warn!(scope, path, "refusing to forward path outside its scope");
        return (StatusCode::BAD_REQUEST, "Invalid path").into_response();
    };
    match gateway.executor().send(ApiRequest::get(target.as_str())).await {
        Ok(response) => (
            response.status,
            [(CONTENT_TYPE, "application/json")],
            response.body,
        )
            .into_response(),
        Err(ExecuteError::Api(ApiError::Status { status, body })) => {
            (status, [(CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(e) if e.is_unauthenticated() => {
            (StatusCode::UNAUTHORIZED, "Session expired").into_response()
        }
        Err(e) => {
            warn!(error = %e, path = %target, "forwarded call failed");
            (StatusCode::BAD_GATEWAY, "Upstream API unavailable").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_path_keeps_plain_segments() {
        assert_eq!(
            scoped_path("/client", "bookings/42"),
            Some("/client/bookings/42".to_string())
        );
    }

    #[test]
    fn scoped_path_refuses_escapes() {
        for path in ["../admin", "bookings/../../admin", "./x", "a//b", "a/", "a?b=1", "a\\..\\b"] {
            assert_eq!(scoped_path("/client", path), None, "{path}");
        }
    }
}
