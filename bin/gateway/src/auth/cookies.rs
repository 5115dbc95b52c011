//! Conversion of credential changes into response cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite as CookieSameSite};
use bandstand_credentials::{CredentialChange, MAX_COOKIE_AGE_SECS, SameSite};
use time::{Duration as TimeDuration, OffsetDateTime};

fn same_site(value: SameSite) -> CookieSameSite {
    match value {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    }
}

/// Builds the response cookie for a credential change.
///
/// `secure_cookies` can only drop the Secure flag, never add it to a
/// credential the remote side marked insecure.
#[must_use]
pub fn change_cookie(change: CredentialChange, secure_cookies: bool) -> Cookie<'static> {
    match change {
        CredentialChange::Set(credential) => {
            let policy = credential.policy;
            let mut cookie = Cookie::build((credential.name, credential.value))
                .path(policy.path)
                .http_only(policy.http_only)
                .secure(policy.secure && secure_cookies)
                .same_site(same_site(policy.same_site));
            match (policy.max_age, policy.expires) {
                (Some(max_age), _) => {
                    cookie = cookie.max_age(TimeDuration::seconds(max_age.num_seconds()));
                }
                (None, Some(expires)) => {
                    if let Ok(at) = OffsetDateTime::from_unix_timestamp(expires.timestamp()) {
                        cookie = cookie.expires(at);
                    }
                }
                (None, None) => {}
            }
            cookie.build()
        }
        CredentialChange::Removed(name) => Cookie::build((name, ""))
            .path("/")
            .max_age(TimeDuration::ZERO)
            .build(),
    }
}

/// Collects credential changes into a jar holding only those changes.
#[must_use]
pub fn changes_jar(changes: Vec<CredentialChange>, secure_cookies: bool) -> CookieJar {
    changes.into_iter().fold(CookieJar::new(), |jar, change| {
        jar.add(change_cookie(change, secure_cookies))
    })
}

/// Builds the locale preference cookie.
///
/// The cookie is readable by page scripts so that a client-side language
/// switcher can update it. The lifetime is capped to the longest cookie age.
#[must_use]
pub fn locale_cookie(name: &str, locale: &str, secure: bool, max_age_days: i64) -> Cookie<'static> {
    Cookie::build((name.to_string(), locale.to_string()))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(CookieSameSite::Lax)
        .max_age(TimeDuration::seconds(
            max_age_days
                .saturating_mul(24 * 60 * 60)
                .clamp(0, MAX_COOKIE_AGE_SECS),
        ))
        .build()
}
