//! Test doubles for the remote API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};

type Scripted = Result<ApiResponse, TransportError>;

/// A remote API that answers each path from a script.
///
/// Responses for a path are consumed in order; the last one repeats once the
/// script runs out. Paths without a script answer `404`.
#[derive(Default)]
pub(crate) struct FakeApi {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
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

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

#[async_trait]
impl ApiTransport for FakeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().expect("lock").push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

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

pub(crate) fn unreachable_api() -> Scripted {
    Err(TransportError::new("connection refused"))
}

/// Builds an unsigned JWT carrying the given subject and role.
pub(crate) fn token(subject: &str, role: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{subject}","role":"{role}"}}"#));
    format!("{header}.{body}.sig")
}
