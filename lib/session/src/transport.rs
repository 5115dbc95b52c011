//! Transport to the remote REST API.
//!
//! The remote API is a conventional JSON service. Credentials travel as a
//! bearer header on requests and come back as `Set-Cookie` headers on the
//! authentication endpoints.

use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::{Method, StatusCode};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::{ApiError, TransportError};

/// An outbound request, relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    /// Creates a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    /// Creates a `POST` request with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            bearer: None,
        }
    }

    /// Sets or clears the bearer token.
    #[must_use]
    pub fn with_bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer;
        self
    }
}

/// A response from the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Every `Set-Cookie` header, in order.
    pub set_cookie: Vec<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Creates a response without cookies.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            set_cookie: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a `Set-Cookie` header.
    #[must_use]
    pub fn with_cookie(mut self, header: impl Into<String>) -> Self {
        self.set_cookie.push(header.into());
        self
    }

    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts a non-2xx response into an `ApiError`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` if the status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            })
        }
    }

    /// Deserializes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Decode` if the body is not the expected JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode {
            reason: e.to_string(),
        })
    }
}

/// Sends requests to the remote API.
///
/// Implementations report every answered request as `Ok`, whatever its
/// status; only failures to reach the remote side are errors.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Sends a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote side could not be reached.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the API at `base_url`.
    ///
    /// Redirects are not followed: the authentication endpoints answer with
    /// cookies that must not be lost to a redirect hop.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, Report<TransportError>> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            TransportError::new(format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the absolute URL for an API path.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

fn transport_error(e: &reqwest::Error) -> TransportError {
    TransportError {
        reason: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url_for(&request.path));
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();
        let set_cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&e))?
            .to_vec();

        tracing::debug!(method = %request.method, path = %request.path, status = status.as_u16(), "remote API call");

        Ok(ApiResponse {
            status,
            set_cookie,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_for_joins_cleanly() {
        let transport = HttpTransport::new("http://api.test/v1/", None).expect("client");
        assert_eq!(transport.url_for("/user"), "http://api.test/v1/user");
        assert_eq!(transport.url_for("auth/refresh"), "http://api.test/v1/auth/refresh");
    }

    #[test]
    fn request_builders() {
        let request = ApiRequest::post("/auth/refresh", json!({"refreshToken": "r"}))
            .with_bearer(Some("a".to_string()));
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.bearer.as_deref(), Some("a"));
        assert!(ApiRequest::get("/user").body.is_none());
    }

    #[test]
    fn error_for_status_keeps_body() {
        let err = ApiResponse::new(StatusCode::CONFLICT, "taken")
            .error_for_status()
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: StatusCode::CONFLICT,
                body: "taken".to_string()
            }
        );
        assert!(ApiResponse::new(StatusCode::OK, "").error_for_status().is_ok());
    }

    #[test]
    fn json_decode_failure_is_decode_error() {
        let response = ApiResponse::new(StatusCode::OK, "not json");
        let result: Result<Value, _> = response.json();
        assert!(matches!(result, Err(ApiError::Decode { .. })));
    }
}
