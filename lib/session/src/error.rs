//! Error types for the session crate.
//!
//! The taxonomy follows how each failure is recovered:
//! - `TransportError`: the remote side was not reached; propagated, never retried
//! - `ApiError`: the remote side answered with a failure status
//! - `RefreshError`: renewal failed; fatal to the session
//! - `ExecuteError`: the final outcome of an authenticated call
//! - `SessionError`: context for gateway operations, wrapped in a rootcause `Report`

use reqwest::StatusCode;
use std::fmt;

/// The remote API could not be reached or its response could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub reason: String,
    pub timed_out: bool,
}

impl TransportError {
    /// Creates a transport error that is not a timeout.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            timed_out: false,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(f, "request to remote API timed out: {}", self.reason)
        } else {
            write!(f, "request to remote API failed: {}", self.reason)
        }
    }
}

impl std::error::Error for TransportError {}

/// Failure of a single call to the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The remote side answered with a non-success status.
    Status { status: StatusCode, body: String },
    /// The remote side was not reached.
    Transport(TransportError),
    /// The response body did not have the expected shape.
    Decode { reason: String },
}

impl ApiError {
    /// Returns true for the authorization-expired signal.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Returns the HTTP status, if the remote side answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode { .. } => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, .. } => write!(f, "remote API returned {status}"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Decode { reason } => write!(f, "unexpected response from remote API: {reason}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// Renewal of the access credential failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh credential is stored; nothing was sent.
    NoRefreshCredential,
    /// The renewal endpoint answered with a non-success status.
    Rejected { status: StatusCode },
    /// The renewal endpoint succeeded but issued no access credential.
    MissingAccessCredential,
    /// The renewal endpoint was not reached.
    Transport(TransportError),
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshCredential => write!(f, "no refresh credential to renew with"),
            Self::Rejected { status } => write!(f, "renewal rejected with {status}"),
            Self::MissingAccessCredential => {
                write!(f, "renewal response carried no access credential")
            }
            Self::Transport(e) => write!(f, "renewal failed: {e}"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Final outcome of a failed authenticated call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// The call failed and no (further) recovery applies.
    Api(ApiError),
    /// The call was rejected with `401` and the credential could not be renewed.
    RefreshFailed(RefreshError),
}

impl ExecuteError {
    /// Returns true if the caller should treat the session as logged out.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Api(e) => e.is_unauthorized(),
            Self::RefreshFailed(_) => true,
        }
    }
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "{e}"),
            Self::RefreshFailed(e) => write!(f, "could not refresh: {e}"),
        }
    }
}

impl std::error::Error for ExecuteError {}

/// Errors from session gateway operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The remote API was not reached.
    Unavailable { operation: &'static str, reason: String },
    /// The remote API answered with a status the operation does not handle.
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },
    /// The remote API answered with a body or headers the operation cannot use.
    InvalidResponse {
        operation: &'static str,
        reason: String,
    },
}

impl SessionError {
    /// Maps a final API failure into operation context.
    #[must_use]
    pub fn from_api(operation: &'static str, error: &ApiError) -> Self {
        match error {
            ApiError::Status { status, .. } => Self::UnexpectedStatus {
                operation,
                status: *status,
            },
            ApiError::Transport(e) => Self::Unavailable {
                operation,
                reason: e.reason.clone(),
            },
            ApiError::Decode { reason } => Self::InvalidResponse {
                operation,
                reason: reason.clone(),
            },
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { operation, reason } => {
                write!(f, "{operation}: remote API unavailable: {reason}")
            }
            Self::UnexpectedStatus { operation, status } => {
                write!(f, "{operation}: unexpected status {status}")
            }
            Self::InvalidResponse { operation, reason } => {
                write!(f, "{operation}: invalid response: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}
