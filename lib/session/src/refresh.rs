//! Renewal of the access credential.
//!
//! Renewal is fail-closed: whenever the remote side refuses or cannot be
//! reached, the refresh credential is deleted and a fresh login is required.
//!
//! Concurrent renewals are coalesced at two levels:
//! - A generation counter lets a caller whose call failed before another
//!   caller's renewal completed reuse the freshly installed access credential.
//! - [`RenewalFlights`] shares one in-flight renewal per refresh credential,
//!   so concurrent callers (within one session or across requests carrying
//!   the same cookies) await a single call to the renewal endpoint.

use bandstand_credentials::{Credential, CredentialKind, CredentialStore, find_credential};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::error::RefreshError;
use crate::settings::SessionSettings;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};

/// How long a completed renewal stays shareable.
const DEFAULT_FLIGHT_TTL: std::time::Duration = std::time::Duration::from_secs(30);

/// Credentials issued by an authentication endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Issued {
    pub access: Option<Credential>,
    pub refresh: Option<Credential>,
}

/// Token body some deployments return instead of cookies.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Extracts the credentials issued in a response.
///
/// `Set-Cookie` headers win; a JSON body with `accessToken`/`refreshToken`
/// is the fallback. A cookie that deletes a credential counts as not issued.
pub(crate) fn issued_credentials(response: &ApiResponse, settings: &SessionSettings) -> Issued {
    let names = &settings.credentials;
    let body: IssuedBody = serde_json::from_slice(&response.body).unwrap_or_default();

    let pick = |kind: CredentialKind, fallback: Option<String>| {
        let name = names.name_of(kind);
        find_credential(response.set_cookie.clone(), name)
            .or_else(|| {
                fallback.map(|value| Credential::new(name, value, Default::default()))
            })
            .filter(|credential| !credential.policy.is_removal() && !credential.value.is_empty())
    };

    Issued {
        access: pick(CredentialKind::Access, body.access_token),
        refresh: pick(CredentialKind::Refresh, body.refresh_token),
    }
}

#[derive(Debug, Clone)]
struct Renewed {
    access: Credential,
    refresh: Option<Credential>,
}

type Renewal = Result<Renewed, RefreshError>;

struct Flight {
    started: Instant,
    outcome: Arc<OnceCell<Renewal>>,
}

/// Registry of renewals in flight, keyed by refresh credential.
///
/// Share one registry between all gateways of a process to coalesce
/// renewals across concurrent requests from the same browser.
pub struct RenewalFlights {
    flights: Mutex<HashMap<String, Flight>>,
    ttl: std::time::Duration,
}

impl RenewalFlights {
    /// Creates a registry with the default retention.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_FLIGHT_TTL)
    }

    /// Creates a registry that keeps completed renewals for `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: std::time::Duration) -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns the shared outcome slot for a refresh credential.
    fn join(&self, refresh_token: &str) -> Arc<OnceCell<Renewal>> {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        let ttl = self.ttl;
        // In-flight renewals are never evicted, however old.
        flights.retain(|_, flight| {
            !flight.outcome.initialized() || flight.started.elapsed() < ttl
        });
        let flight = flights.entry(refresh_token.to_string()).or_insert_with(|| Flight {
            started: Instant::now(),
            outcome: Arc::new(OnceCell::new()),
        });
        Arc::clone(&flight.outcome)
    }

    /// Returns the number of tracked renewals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no renewal is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RenewalFlights {
    fn default() -> Self {
        Self::new()
    }
}

/// Performs renewals of the access credential for one session.
pub struct TokenRefresher {
    transport: Arc<dyn ApiTransport>,
    store: Arc<dyn CredentialStore>,
    settings: Arc<SessionSettings>,
    flights: Arc<RenewalFlights>,
    generation: AtomicU64,
}

impl TokenRefresher {
    /// Creates a refresher with a private flight registry.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        store: Arc<dyn CredentialStore>,
        settings: Arc<SessionSettings>,
    ) -> Self {
        Self {
            transport,
            store,
            settings,
            flights: Arc::new(RenewalFlights::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Uses a shared flight registry.
    #[must_use]
    pub fn with_flights(mut self, flights: Arc<RenewalFlights>) -> Self {
        self.flights = flights;
        self
    }

    /// Returns the number of successful renewals so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Renews the access credential with the default lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if no refresh credential is stored or the renewal
    /// fails; in the latter case the refresh credential has been deleted.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        self.refresh_with(None).await
    }

    /// Renews unless a renewal already succeeded since generation `seen`.
    ///
    /// # Errors
    ///
    /// See [`TokenRefresher::refresh`].
    pub async fn refresh_after(&self, seen: u64) -> Result<String, RefreshError> {
        if self.generation() != seen {
            let access_name = self.settings.credentials.name_of(CredentialKind::Access);
            if let Some(access) = self.store.read(access_name) {
                debug!("reusing access credential renewed by a concurrent call");
                return Ok(access);
            }
        }
        self.refresh_with(None).await
    }

    /// Renews the access credential, keeping it for at least `lifetime`
    /// when that is longer than the configured default.
    ///
    /// # Errors
    ///
    /// See [`TokenRefresher::refresh`].
    #[instrument(skip(self))]
    pub async fn refresh_with(&self, lifetime: Option<Duration>) -> Result<String, RefreshError> {
        let names = &self.settings.credentials;
        let Some(refresh_token) = self.store.read(names.name_of(CredentialKind::Refresh)) else {
            debug!("no refresh credential; not contacting the renewal endpoint");
            return Err(RefreshError::NoRefreshCredential);
        };

        let outcome = self.flights.join(&refresh_token);
        let renewal = outcome
            .get_or_init(|| self.renew(refresh_token.clone()))
            .await
            .clone();

        match renewal {
            Ok(renewed) => {
                let default_lifetime = self.settings.access_max_age();
                let floor = lifetime.map_or(default_lifetime, |l| l.max(default_lifetime));
                let policy = renewed.access.policy.clone().with_min_max_age(Some(floor));
                self.store
                    .write(names.name_of(CredentialKind::Access), &renewed.access.value, policy);
                if let Some(rotated) = renewed.refresh {
                    self.store.install(rotated);
                }
                self.generation.fetch_add(1, Ordering::AcqRel);
                info!("access credential renewed");
                Ok(renewed.access.value)
            }
            Err(e) => {
                warn!(error = %e, "renewal failed; ending session");
                self.store.delete(names.name_of(CredentialKind::Access));
                self.store.delete(names.name_of(CredentialKind::Refresh));
                Err(e)
            }
        }
    }

    /// Calls the renewal endpoint once.
    async fn renew(&self, refresh_token: String) -> Renewal {
        let request = ApiRequest::post(
            self.settings.refresh_path.clone(),
            json!({ "refreshToken": refresh_token }),
        );
        let response = self
            .transport
            .send(request)
            .await
            .map_err(RefreshError::Transport)?;
        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status,
            });
        }

        let issued = issued_credentials(&response, &self.settings);
        let access = issued.access.ok_or(RefreshError::MissingAccessCredential)?;
        Ok(Renewed {
            access,
            refresh: issued.refresh,
        })
    }
}
