//! Execution of authenticated calls to the remote API.

use bandstand_core::CallId;
use bandstand_credentials::{CredentialKind, CredentialStore};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ApiError, ExecuteError};
use crate::refresh::TokenRefresher;
use crate::settings::SessionSettings;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};

/// Which attempt of a logical call is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Retried,
}

impl Attempt {
    /// Returns true if a failed attempt may be recovered by renewing the
    /// access credential and trying again.
    ///
    /// Only the first attempt qualifies, and only on `401`.
    #[must_use]
    pub fn may_refresh(self, error: &ApiError) -> bool {
        self == Self::First && error.is_unauthorized()
    }
}

/// Runs calls with the current access credential attached, renewing it
/// once when the remote side answers `401`.
pub struct AuthenticatedExecutor {
    transport: Arc<dyn ApiTransport>,
    store: Arc<dyn CredentialStore>,
    settings: Arc<SessionSettings>,
    refresher: Arc<TokenRefresher>,
}

impl AuthenticatedExecutor {
    #[must_use]
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        store: Arc<dyn CredentialStore>,
        settings: Arc<SessionSettings>,
        refresher: Arc<TokenRefresher>,
    ) -> Self {
        Self {
            transport,
            store,
            settings,
            refresher,
        }
    }

    /// Returns the refresher used for renewals.
    #[must_use]
    pub fn refresher(&self) -> &Arc<TokenRefresher> {
        &self.refresher
    }

    /// Executes a call, passing it the access credential if one is stored.
    ///
    /// The call is made at most twice. The access credential is re-read
    /// before each attempt, so a retry always carries the renewed value.
    ///
    /// # Errors
    ///
    /// Returns `ExecuteError::Api` with the final failure of the call, or
    /// `ExecuteError::RefreshFailed` if the call was rejected with `401` and
    /// the credential could not be renewed.
    pub async fn execute<T, F, Fut>(&self, call: F) -> Result<T, ExecuteError>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let call_id = CallId::new();
        let mut attempt = Attempt::First;

        loop {
            let seen = self.refresher.generation();
            let bearer = self
                .store
                .read(self.settings.credentials.name_of(CredentialKind::Access));
            debug!(%call_id, ?attempt, authenticated = bearer.is_some(), "dispatching API call");

            match call(bearer).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt.may_refresh(&e) => {
                    debug!(%call_id, "access credential rejected; renewing");
                    if let Err(refresh_error) = self.refresher.refresh_after(seen).await {
                        warn!(%call_id, error = %refresh_error, "could not renew access credential");
                        return Err(ExecuteError::RefreshFailed(refresh_error));
                    }
                    attempt = Attempt::Retried;
                }
                Err(e) => {
                    debug!(%call_id, ?attempt, error = %e, "API call failed");
                    return Err(ExecuteError::Api(e));
                }
            }
        }
    }

    /// Sends a request through the transport with the access credential as
    /// bearer. Non-2xx answers are failures.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedExecutor::execute`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ExecuteError> {
        self.execute(|bearer| {
            let transport = Arc::clone(&self.transport);
            let request = request.clone().with_bearer(bearer);
            async move { transport.send(request).await?.error_for_status() }
        })
        .await
    }

    /// Sends a request and decodes the JSON body of the answer.
    ///
    /// # Errors
    ///
    /// See [`AuthenticatedExecutor::execute`]; a body that does not decode
    /// is `ApiError::Decode`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<T, ExecuteError> {
        let response = self.send(request).await?;
        response.json().map_err(ExecuteError::Api)
    }
}
