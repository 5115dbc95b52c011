//! Credential storage for the bandstand session gateway.
//!
//! This crate provides:
//! - The credential model (`Credential`, `CredentialKind`, `CookiePolicy`)
//! - A syntactic `Set-Cookie` parser (`parse_set_cookie`, `RawSetCookie`)
//! - The `CredentialStore` trait and an in-memory cookie jar implementation
//!
//! # Example
//!
//! ```
//! use bandstand_credentials::{CookieJarStore, CredentialStore, parse_set_cookie};
//!
//! let jar = CookieJarStore::new();
//! let parsed = parse_set_cookie("access_token=abc; HttpOnly; Secure; SameSite=Lax; Max-Age=900")
//!     .expect("valid header");
//! jar.install(parsed.into_credential());
//!
//! assert_eq!(jar.read("access_token").as_deref(), Some("abc"));
//! ```

pub mod credential;
pub mod error;
pub mod set_cookie;
pub mod store;

pub use credential::{
    CookiePolicy, Credential, CredentialKind, CredentialNames, MAX_COOKIE_AGE_SECS, SameSite,
    clamped_max_age,
};
pub use error::SetCookieError;
pub use set_cookie::{AttributeValue, ParsedCookie, RawSetCookie, find_credential, parse_set_cookie};
pub use store::{CookieJarStore, CredentialChange, CredentialStore};
