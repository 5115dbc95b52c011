//! The per-navigation answer to "who is the current user".
//!
//! A `SessionContext` is loaded once per request and passed explicitly to
//! whatever needs the identity. It is never cached across requests: the
//! credentials in the browser are the only persistent session state.

use bandstand_core::Role;
use bandstand_credentials::CredentialKind;
use rootcause::prelude::Report;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

use crate::auth::SessionGateway;
use crate::error::{ExecuteError, SessionError};
use crate::settings::IdentityEndpoint;
use crate::transport::ApiRequest;

/// The signed-in user as reported by the identity endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(id) => id,
        Id::Number(id) => id.to_string(),
    })
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum Identity {
    #[default]
    Anonymous,
    User(CurrentUser),
}

/// Identity resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionContext {
    identity: Identity,
}

impl SessionContext {
    /// Creates a context for an anonymous visitor.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a context for a signed-in user.
    #[must_use]
    pub fn signed_in(user: CurrentUser) -> Self {
        Self {
            identity: Identity::User(user),
        }
    }

    /// Resolves the current identity by calling the identity endpoint.
    ///
    /// A session whose credentials are missing, refused, or cannot be
    /// renewed is anonymous.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote API is unreachable or answers the
    /// identity call with an unexpected status or body.
    #[instrument(skip(gateway))]
    pub async fn load(gateway: &SessionGateway) -> Result<Self, Report<SessionError>> {
        let settings = gateway.settings();
        let store = gateway.store();
        let has_access = store
            .read(settings.credentials.name_of(CredentialKind::Access))
            .is_some();
        let has_refresh = store
            .read(settings.credentials.name_of(CredentialKind::Refresh))
            .is_some();
        if !has_access && !has_refresh {
            debug!("no credentials; anonymous");
            return Ok(Self::anonymous());
        }

        let path = match settings.identity_endpoint {
            IdentityEndpoint::Current => settings.identity_path.clone(),
            IdentityEndpoint::BySubject => {
                let Some(subject) = Self::subject(gateway).await else {
                    return Ok(Self::anonymous());
                };
                format!("{}/{subject}", settings.identity_path.trim_end_matches('/'))
            }
        };

        match gateway
            .executor()
            .send_json::<CurrentUser>(ApiRequest::get(path))
            .await
        {
            Ok(user) => {
                debug!(user_id = %user.id, role = %user.role, "identity resolved");
                Ok(Self::signed_in(user))
            }
            Err(ExecuteError::RefreshFailed(e)) => {
                debug!(error = %e, "session could not be renewed; anonymous");
                Ok(Self::anonymous())
            }
            Err(ExecuteError::Api(e)) if e.is_unauthorized() => {
                debug!("identity call refused after renewal; anonymous");
                Ok(Self::anonymous())
            }
            Err(ExecuteError::Api(e)) => {
                tracing::error!(error = %e, "identity call failed");
                Err(SessionError::from_api("identity", &e).into())
            }
        }
    }

    /// Returns the subject of the access credential, renewing it first when
    /// it is missing or undecodable.
    async fn subject(gateway: &SessionGateway) -> Option<String> {
        if let Some(claims) = gateway.access_claims() {
            return Some(claims.subject().to_string());
        }
        if let Err(e) = gateway.refresher().refresh().await {
            debug!(error = %e, "no usable access credential; anonymous");
            return None;
        }
        gateway
            .access_claims()
            .map(|claims| claims.subject().to_string())
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&CurrentUser> {
        match &self.identity {
            Identity::User(user) => Some(user),
            Identity::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// Returns the role of the signed-in user, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.user().map(|user| user.role)
    }
}
