//! Plain-text pages standing in for the application shells.
//!
//! The gateway fronts applications that render their own pages; these
//! handlers only report what the gateway resolved for the request.

use axum::{
    Extension,
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use bandstand_edge::Locale;

use crate::auth::OptionalUser;

/// The forbidden surface.
pub async fn forbidden(Extension(locale): Extension<Locale>) -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        format!("[{locale}] This page is not available for your account."),
    )
}

/// Any other page.
pub async fn page(
    Extension(locale): Extension<Locale>,
    OptionalUser(user): OptionalUser,
    uri: Uri,
) -> impl IntoResponse {
    match user {
        Some(user) => format!(
            "[{locale}] {} as {} ({})",
            uri.path(),
            user.display_name.as_deref().unwrap_or(&user.email),
            user.role
        ),
        None => format!("[{locale}] {} as guest", uri.path()),
    }
}
