//! Credential storage backed by a cookie jar.
//!
//! The store is scoped to one browser session. Reads, writes and deletes are
//! synchronous and idempotent; deleting an absent credential is a no-op.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::credential::{CookiePolicy, Credential};

/// Storage for named credentials.
///
/// Implementations use interior mutability so that a single store can be
/// shared by the request executor and the refresh coordinator.
pub trait CredentialStore: Send + Sync {
    /// Returns the credential stored under `name`, with its policy.
    fn get(&self, name: &str) -> Option<Credential>;

    /// Stores `value` under `name` with the given policy, replacing any
    /// previous credential of that name.
    fn write(&self, name: &str, value: &str, policy: CookiePolicy);

    /// Removes the credential stored under `name`.
    fn delete(&self, name: &str);

    /// Returns only the value stored under `name`.
    fn read(&self, name: &str) -> Option<String> {
        self.get(name).map(|credential| credential.value)
    }

    /// Installs a credential emitted by the remote side.
    ///
    /// A credential whose policy marks it as removed is deleted instead.
    fn install(&self, credential: Credential) {
        if credential.policy.is_removal() {
            self.delete(&credential.name);
        } else {
            self.write(&credential.name, &credential.value, credential.policy);
        }
    }
}

/// A change applied to a cookie jar, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialChange {
    Set(Credential),
    Removed(String),
}

#[derive(Debug, Clone)]
struct Entry {
    credential: Credential,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// In-memory cookie jar.
///
/// Tracks the changes made since creation so that a server-side adapter can
/// replay them on the outgoing response.
#[derive(Debug, Default)]
pub struct CookieJarStore {
    entries: RwLock<HashMap<String, Entry>>,
    changes: RwLock<Vec<CredentialChange>>,
}

impl CookieJarStore {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar seeded with cookies sent by the browser.
    ///
    /// Request cookies carry no attributes, so they get the default policy.
    /// Seeding is not recorded as a change.
    #[must_use]
    pub fn from_request_cookies<I, N, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let entries = cookies
            .into_iter()
            .map(|(name, value)| {
                let name = name.into();
                let entry = Entry {
                    credential: Credential::new(name.clone(), value, CookiePolicy::default()),
                    expires_at: None,
                };
                (name, entry)
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
            changes: RwLock::new(Vec::new()),
        }
    }

    /// Returns the changes made so far.
    #[must_use]
    pub fn changes(&self) -> Vec<CredentialChange> {
        self.changes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains the recorded changes.
    pub fn take_changes(&self) -> Vec<CredentialChange> {
        std::mem::take(&mut *self.changes.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, change: CredentialChange) {
        self.changes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change);
    }
}

impl CredentialStore for CookieJarStore {
    fn get(&self, name: &str) -> Option<Credential> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(name)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.credential.clone())
    }

    fn write(&self, name: &str, value: &str, policy: CookiePolicy) {
        let now = Utc::now();
        let credential = Credential::new(name, value, policy);
        let entry = Entry {
            expires_at: credential.policy.expiry_from(now),
            credential: credential.clone(),
        };

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), entry);
        debug!(credential = name, "credential written");
        self.record(CredentialChange::Set(credential));
    }

    fn delete(&self, name: &str) {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        // A cookie the browser sent is deleted on the response even if this
        // jar never wrote it, so the removal is recorded unconditionally.
        if removed.is_some() {
            debug!(credential = name, "credential deleted");
        }
        self.record(CredentialChange::Removed(name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::SameSite;
    use chrono::Duration;

    #[test]
    fn write_then_get_round_trips_value_and_policy() {
        let jar = CookieJarStore::new();
        let policy = CookiePolicy {
            http_only: true,
            same_site: SameSite::Strict,
            secure: false,
            max_age: Some(Duration::minutes(15)),
            expires: None,
            path: "/".to_string(),
        };
        jar.write("access_token", "abc", policy.clone());

        let stored = jar.get("access_token").expect("stored");
        assert_eq!(stored.value, "abc");
        assert_eq!(stored.policy, policy);
        assert_eq!(jar.read("access_token").as_deref(), Some("abc"));
    }

    #[test]
    fn write_replaces_in_place() {
        let jar = CookieJarStore::new();
        jar.write("access_token", "old", CookiePolicy::default());
        jar.write("access_token", "new", CookiePolicy::default());
        assert_eq!(jar.read("access_token").as_deref(), Some("new"));
    }

    #[test]
    fn delete_is_idempotent() {
        let jar = CookieJarStore::new();
        jar.delete("refresh_token");
        jar.write("refresh_token", "r", CookiePolicy::default());
        jar.delete("refresh_token");
        jar.delete("refresh_token");
        assert!(jar.read("refresh_token").is_none());
    }

    #[test]
    fn expired_credentials_read_as_absent() {
        let jar = CookieJarStore::new();
        let policy = CookiePolicy {
            expires: Some(Utc::now() - Duration::seconds(1)),
            ..CookiePolicy::default()
        };
        jar.write("access_token", "stale", policy);
        assert!(jar.get("access_token").is_none());
    }

    #[test]
    fn install_honours_removal() {
        let jar = CookieJarStore::from_request_cookies([("refresh_token", "r")]);
        jar.install(Credential::new(
            "refresh_token",
            "",
            CookiePolicy::default().with_max_age(Duration::zero()),
        ));
        assert!(jar.read("refresh_token").is_none());
        assert_eq!(
            jar.changes(),
            vec![CredentialChange::Removed("refresh_token".to_string())]
        );
    }

    #[test]
    fn seeded_cookies_are_readable_but_not_changes() {
        let jar = CookieJarStore::from_request_cookies([("access_token", "a"), ("locale", "en")]);
        assert_eq!(jar.read("access_token").as_deref(), Some("a"));
        assert!(jar.changes().is_empty());
    }

    #[test]
    fn changes_are_recorded_in_order_and_drained() {
        let jar = CookieJarStore::new();
        jar.write("access_token", "a", CookiePolicy::default());
        jar.delete("refresh_token");

        let changes = jar.take_changes();
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], CredentialChange::Set(c) if c.name == "access_token"));
        assert_eq!(
            changes[1],
            CredentialChange::Removed("refresh_token".to_string())
        );
        assert!(jar.changes().is_empty());
    }
}
