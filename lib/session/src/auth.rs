//! Login, federated sign-in and logout against the remote API.
//!
//! A `SessionGateway` is built per browser session around that session's
//! credential store. It owns the executor and refresher used for every
//! authenticated call made on the session's behalf.

use bandstand_core::AccessClaims;
use bandstand_credentials::{Credential, CredentialKind, CredentialStore};
use reqwest::StatusCode;
use rootcause::prelude::Report;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::SessionError;
use crate::executor::AuthenticatedExecutor;
use crate::refresh::{RenewalFlights, TokenRefresher, issued_credentials};
use crate::settings::SessionSettings;
use crate::transport::{ApiRequest, ApiTransport};

/// Statuses with which the authentication endpoints refuse what was offered.
const REFUSALS: [StatusCode; 3] = [
    StatusCode::BAD_REQUEST,
    StatusCode::UNAUTHORIZED,
    StatusCode::FORBIDDEN,
];

/// How long a new session should last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionLength {
    /// Ends with the browser session unless the remote side says otherwise.
    #[default]
    Session,
    /// "Remember me": the refresh credential outlives the browser session.
    Remembered,
}

/// Outcome of a login or federated sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Both credentials were issued and stored.
    SignedIn,
    /// The remote side refused the credentials offered.
    Rejected { status: StatusCode },
}

/// Outcome of a logout. Local credentials are gone in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The remote side revoked the refresh credential.
    Revoked,
    /// No refresh credential was stored; nothing was sent.
    NothingToRevoke,
    /// The revocation call failed or was refused.
    RemoteFailed,
}

/// Entry point for session operations on behalf of one browser session.
pub struct SessionGateway {
    transport: Arc<dyn ApiTransport>,
    store: Arc<dyn CredentialStore>,
    settings: Arc<SessionSettings>,
    executor: AuthenticatedExecutor,
}

impl SessionGateway {
    /// Creates a gateway with its own renewal registry.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        store: Arc<dyn CredentialStore>,
        settings: SessionSettings,
    ) -> Self {
        Self::with_flights(transport, store, settings, Arc::new(RenewalFlights::new()))
    }

    /// Creates a gateway that shares renewals through `flights`.
    #[must_use]
    pub fn with_flights(
        transport: Arc<dyn ApiTransport>,
        store: Arc<dyn CredentialStore>,
        settings: SessionSettings,
        flights: Arc<RenewalFlights>,
    ) -> Self {
        let settings = Arc::new(settings);
        let refresher = Arc::new(
            TokenRefresher::new(
                Arc::clone(&transport),
                Arc::clone(&store),
                Arc::clone(&settings),
            )
            .with_flights(flights),
        );
        let executor = AuthenticatedExecutor::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&settings),
            refresher,
        );
        Self {
            transport,
            store,
            settings,
            executor,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Returns the executor for authenticated calls.
    #[must_use]
    pub fn executor(&self) -> &AuthenticatedExecutor {
        &self.executor
    }

    /// Returns the refresher for explicit renewals.
    #[must_use]
    pub fn refresher(&self) -> &Arc<TokenRefresher> {
        self.executor.refresher()
    }

    /// Decodes the stored access credential, if any.
    ///
    /// An undecodable credential reads as absent.
    #[must_use]
    pub fn access_claims(&self) -> Option<AccessClaims> {
        let token = self.read(CredentialKind::Access)?;
        match AccessClaims::decode(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "stored access credential is not decodable");
                None
            }
        }
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote API is unreachable, answers with a
    /// status other than success or a refusal, or issues no access credential.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        length: SessionLength,
    ) -> Result<LoginOutcome, Report<SessionError>> {
        let request = ApiRequest::post(
            self.settings.login_path.clone(),
            json!({ "email": email, "password": password }),
        );
        self.sign_in("login", request, length).await
    }

    /// Signs in with an ID token from a federated identity provider.
    ///
    /// # Errors
    ///
    /// See [`SessionGateway::login`].
    #[instrument(skip(self, id_token))]
    pub async fn federated_sign_in(
        &self,
        provider: &str,
        id_token: &str,
        length: SessionLength,
    ) -> Result<LoginOutcome, Report<SessionError>> {
        let request = ApiRequest::post(
            self.settings.federated_path(provider),
            json!({ "idToken": id_token }),
        );
        self.sign_in("federated sign-in", request, length).await
    }

    async fn sign_in(
        &self,
        operation: &'static str,
        request: ApiRequest,
        length: SessionLength,
    ) -> Result<LoginOutcome, Report<SessionError>> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| SessionError::Unavailable {
                operation,
                reason: e.reason,
            })?;

        if REFUSALS.contains(&response.status) {
            info!(status = response.status.as_u16(), "{operation} rejected");
            return Ok(LoginOutcome::Rejected {
                status: response.status,
            });
        }
        if !response.is_success() {
            return Err(SessionError::UnexpectedStatus {
                operation,
                status: response.status,
            }
            .into());
        }

        let issued = issued_credentials(&response, &self.settings);
        let Some(access) = issued.access else {
            return Err(SessionError::InvalidResponse {
                operation,
                reason: "no access credential issued".to_string(),
            }
            .into());
        };

        self.install_access(access);
        match issued.refresh {
            Some(refresh) => self.install_refresh(refresh, length),
            None => warn!("{operation} issued no refresh credential; session cannot be renewed"),
        }
        info!(?length, "{operation} succeeded");
        Ok(LoginOutcome::SignedIn)
    }

    fn install_access(&self, access: Credential) {
        let policy = access
            .policy
            .with_min_max_age(Some(self.settings.access_max_age()));
        self.store.write(&access.name, &access.value, policy);
    }

    fn install_refresh(&self, refresh: Credential, length: SessionLength) {
        let policy = match length {
            SessionLength::Remembered => refresh
                .policy
                .with_max_age(self.settings.remembered_refresh_max_age()),
            SessionLength::Session => refresh.policy,
        };
        self.store.write(&refresh.name, &refresh.value, policy);
    }

    /// Ends the session.
    ///
    /// The refresh credential is revoked remotely when one is stored. Both
    /// credentials are deleted locally whatever the remote outcome.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> LogoutOutcome {
        let outcome = match self.read(CredentialKind::Refresh) {
            None => LogoutOutcome::NothingToRevoke,
            Some(refresh_token) => {
                let request = ApiRequest::post(
                    self.settings.logout_path.clone(),
                    json!({ "refreshToken": refresh_token }),
                );
                match self.transport.send(request).await {
                    Ok(response) if response.is_success() => LogoutOutcome::Revoked,
                    Ok(response) => {
                        warn!(status = response.status.as_u16(), "remote logout refused");
                        LogoutOutcome::RemoteFailed
                    }
                    Err(e) => {
                        warn!(error = %e, "remote logout failed");
                        LogoutOutcome::RemoteFailed
                    }
                }
            }
        };

        let names = &self.settings.credentials;
        self.store.delete(names.name_of(CredentialKind::Access));
        self.store.delete(names.name_of(CredentialKind::Refresh));
        info!(?outcome, "logged out");
        outcome
    }

    fn read(&self, kind: CredentialKind) -> Option<String> {
        self.store.read(self.settings.credentials.name_of(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::{FakeApi, status, token, unreachable_api};
    use crate::transport::ApiResponse;
    use bandstand_core::Role;
    use bandstand_credentials::CookieJarStore;
    use chrono::Duration;

    const LOGIN: &str = "/auth/login";
    const LOGOUT: &str = "/auth/logout";

    fn gateway(api: &Arc<FakeApi>, jar: &Arc<CookieJarStore>) -> SessionGateway {
        SessionGateway::new(
            Arc::clone(api) as Arc<dyn ApiTransport>,
            Arc::clone(jar) as Arc<dyn CredentialStore>,
            SessionSettings::default(),
        )
    }

    fn issued() -> Result<ApiResponse, TransportError> {
        Ok(ApiResponse::new(StatusCode::OK, "{}")
            .with_cookie(format!(
                "access_token={}; HttpOnly; Secure; SameSite=Lax; Max-Age=60",
                token("u1", "client")
            ))
            .with_cookie("refresh_token=r1; HttpOnly; Secure; SameSite=Strict"))
    }

    #[tokio::test]
    async fn login_stores_both_credentials() {
        let api = Arc::new(FakeApi::new().on(LOGIN, issued()));
        let jar = Arc::new(CookieJarStore::new());
        let gateway = gateway(&api, &jar);

        let outcome = gateway
            .login("ada@example.com", "secret", SessionLength::Session)
            .await
            .expect("login");

        assert_eq!(outcome, LoginOutcome::SignedIn);
        let access = jar.get("access_token").expect("access");
        assert_eq!(access.policy.max_age, Some(Duration::minutes(15)));
        let refresh = jar.get("refresh_token").expect("refresh");
        assert_eq!(refresh.value, "r1");
        assert_eq!(refresh.policy.max_age, None);

        let claims = gateway.access_claims().expect("claims");
        assert_eq!(claims.subject(), "u1");
        assert_eq!(claims.role(), Role::Client);

        let requests = api.requests();
        assert_eq!(
            requests[0].body,
            Some(json!({ "email": "ada@example.com", "password": "secret" }))
        );
    }

    #[tokio::test]
    async fn remembered_login_keeps_refresh_credential_for_thirty_days() {
        let api = Arc::new(FakeApi::new().on(LOGIN, issued()));
        let jar = Arc::new(CookieJarStore::new());

        gateway(&api, &jar)
            .login("ada@example.com", "secret", SessionLength::Remembered)
            .await
            .expect("login");

        let refresh = jar.get("refresh_token").expect("refresh");
        assert_eq!(refresh.policy.max_age, Some(Duration::days(30)));
    }

    #[tokio::test]
    async fn refused_login_is_an_outcome_not_an_error() {
        let api = Arc::new(FakeApi::new().on(LOGIN, status(StatusCode::UNAUTHORIZED)));
        let jar = Arc::new(CookieJarStore::new());

        let outcome = gateway(&api, &jar)
            .login("ada@example.com", "wrong", SessionLength::Session)
            .await
            .expect("outcome");

        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                status: StatusCode::UNAUTHORIZED
            }
        );
        assert!(jar.changes().is_empty());
    }

    #[tokio::test]
    async fn login_without_access_credential_is_an_error() {
        let api = Arc::new(FakeApi::new().on(
            LOGIN,
            Ok(ApiResponse::new(StatusCode::OK, "{}")),
        ));
        let jar = Arc::new(CookieJarStore::new());

        let result = gateway(&api, &jar)
            .login("ada@example.com", "secret", SessionLength::Session)
            .await;

        assert!(result.is_err());
        assert!(jar.read("access_token").is_none());
    }

    #[tokio::test]
    async fn login_against_unreachable_api_is_an_error() {
        let api = Arc::new(FakeApi::new().on(LOGIN, unreachable_api()));
        let jar = Arc::new(CookieJarStore::new());

        let result = gateway(&api, &jar)
            .login("ada@example.com", "secret", SessionLength::Session)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn federated_sign_in_posts_id_token_to_provider_path() {
        let api = Arc::new(FakeApi::new().on("/auth/google", issued()));
        let jar = Arc::new(CookieJarStore::new());

        let outcome = gateway(&api, &jar)
            .federated_sign_in("google", "id-token", SessionLength::Session)
            .await
            .expect("sign-in");

        assert_eq!(outcome, LoginOutcome::SignedIn);
        assert_eq!(api.requests()[0].body, Some(json!({ "idToken": "id-token" })));
        assert!(jar.read("refresh_token").is_some());
    }

    #[tokio::test]
    async fn logout_revokes_and_deletes_both_credentials() {
        let api = Arc::new(FakeApi::new().on(LOGOUT, status(StatusCode::NO_CONTENT)));
        let jar = Arc::new(CookieJarStore::from_request_cookies([
            ("access_token", "a1"),
            ("refresh_token", "r1"),
        ]));

        let outcome = gateway(&api, &jar).logout().await;

        assert_eq!(outcome, LogoutOutcome::Revoked);
        assert_eq!(api.requests()[0].body, Some(json!({ "refreshToken": "r1" })));
        assert!(jar.read("access_token").is_none());
        assert!(jar.read("refresh_token").is_none());
    }

    #[tokio::test]
    async fn logout_without_refresh_credential_sends_nothing() {
        let api = Arc::new(FakeApi::new());
        let jar = Arc::new(CookieJarStore::from_request_cookies([("access_token", "a1")]));

        let outcome = gateway(&api, &jar).logout().await;

        assert_eq!(outcome, LogoutOutcome::NothingToRevoke);
        assert!(api.requests().is_empty());
        assert!(jar.read("access_token").is_none());
    }

    #[tokio::test]
    async fn failed_remote_logout_still_clears_locally() {
        let api = Arc::new(FakeApi::new().on(LOGOUT, unreachable_api()));
        let jar = Arc::new(CookieJarStore::from_request_cookies([
            ("access_token", "a1"),
            ("refresh_token", "r1"),
        ]));

        let outcome = gateway(&api, &jar).logout().await;

        assert_eq!(outcome, LogoutOutcome::RemoteFailed);
        assert!(jar.read("refresh_token").is_none());
    }

    #[test]
    fn undecodable_access_credential_reads_as_no_claims() {
        let api = Arc::new(FakeApi::new());
        let jar = Arc::new(CookieJarStore::from_request_cookies([("access_token", "garbage")]));
        assert!(gateway(&api, &jar).access_claims().is_none());
    }
}
