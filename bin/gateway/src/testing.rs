//! Test doubles shared by the gateway's tests.

use async_trait::async_trait;
use axum::http::StatusCode;
use bandstand_edge::{AppKind, EdgeSettings};
use bandstand_session::{ApiRequest, ApiResponse, ApiTransport, SessionSettings, TransportError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::config::{ApiConfig, CookieConfig, GatewayConfig};

type Scripted = Result<ApiResponse, TransportError>;

/// A remote API answering each path from a script.
///
/// The last scripted answer for a path repeats; unscripted paths answer `404`.
#[derive(Default)]
pub(crate) struct FakeApi {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    paths: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, path: &str, response: Scripted) -> Self {
        self.scripts
            .lock()
            .expect("lock")
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.paths
            .lock()
            .expect("lock")
            .iter()
            .filter(|p| *p == path)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.paths.lock().expect("lock").len()
    }
}

#[async_trait]
impl ApiTransport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.paths.lock().expect("lock").push(request.path.clone());
        let mut scripts = self.scripts.lock().expect("lock");
        match scripts.get_mut(&request.path) {
            Some(script) if script.len() > 1 => script.pop_front().expect("non-empty"),
            Some(script) => script
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(ApiResponse::new(StatusCode::NOT_FOUND, ""))),
            None => Ok(ApiResponse::new(StatusCode::NOT_FOUND, "")),
        }
    }
}

pub(crate) fn ok_json(body: &str) -> Scripted {
    Ok(ApiResponse::new(StatusCode::OK, body))
}

pub(crate) fn status(code: StatusCode) -> Scripted {
    Ok(ApiResponse::new(code, ""))
}

/// Builds an unsigned JWT carrying the given subject and role.
pub(crate) fn token(subject: &str, role: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{subject}","role":"{role}"}}"#));
    format!("{header}.{body}.sig")
}

/// Configuration for a client application served over plain HTTP.
pub(crate) fn config() -> GatewayConfig {
    GatewayConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        app: AppKind::Client,
        api: ApiConfig::default(),
        cookies: CookieConfig {
            secure: false,
            ..CookieConfig::default()
        },
        session: SessionSettings::default(),
        edge: EdgeSettings::default(),
        routes: None,
        static_dir: "static".to_string(),
    }
}
