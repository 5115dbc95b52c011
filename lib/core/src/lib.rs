//! Core types shared by the bandstand session gateway.
//!
//! This crate provides the pieces every other gateway crate agrees on:
//! the marketplace roles, decoding of the access credential's claims, and
//! identifiers used to correlate log lines.

pub mod claims;
pub mod id;
pub mod role;

pub use claims::{AccessClaims, ClaimsError};
pub use id::{CallId, ParseIdError, RequestId};
pub use role::{ParseRoleError, Role};
