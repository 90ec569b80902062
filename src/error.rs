// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for Siivila
//!
//! Caller misuse (wrong-state calls, rejected writes, claim conflicts) is
//! reported synchronously and never changes a session. Transport-originated
//! failures move the session to `failed` and travel through the event stream;
//! they only surface as [`Error::TransportFailure`] where a driver turns an
//! error event back into a `Result`.

use thiserror::Error;

use crate::filter::StreamFilterStatus;
use crate::network::RequestId;

/// Result type alias for Siivila operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Siivila
#[derive(Error, Debug)]
pub enum Error {
    /// Operation not permitted from the current filter status
    #[error("Cannot {operation} a stream filter in status {status}")]
    InvalidTransition {
        operation: &'static str,
        status: StreamFilterStatus,
    },

    /// Another active session already owns the request
    #[error("Request {request_id} is already filtered by {owner_id}")]
    SessionClaimConflict {
        request_id: RequestId,
        owner_id: String,
    },

    /// Request id is unknown or no longer in flight
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// Request exists but cannot be intercepted any more
    #[error("Request {request_id} is not eligible for filtering: {reason}")]
    NotEligible { request_id: RequestId, reason: String },

    /// Request id registered twice
    #[error("Request {0} is already in flight")]
    DuplicateRequest(RequestId),

    /// Underlying network layer reported an error
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// write() before the start signal or after a terminal status
    #[error("Write rejected in status {status}")]
    WriteRejected { status: StreamFilterStatus },

    /// Pending output queue would grow past its limit
    #[error("Output buffer full: {pending} bytes pending, limit {limit}")]
    OutputBufferFull { pending: usize, limit: usize },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid rewrite pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid transition error
    pub fn invalid_transition(operation: &'static str, status: StreamFilterStatus) -> Self {
        Error::InvalidTransition { operation, status }
    }

    /// Create a write rejection
    pub fn write_rejected(status: StreamFilterStatus) -> Self {
        Error::WriteRejected { status }
    }

    /// Create a not-eligible error
    pub fn not_eligible(request_id: RequestId, reason: impl Into<String>) -> Self {
        Error::NotEligible {
            request_id,
            reason: reason.into(),
        }
    }

    /// Create a transport failure
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::TransportFailure(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this was caused by the caller using a session wrongly
    ///
    /// These never change session state.
    pub fn is_caller_misuse(&self) -> bool {
        matches!(
            self,
            Error::InvalidTransition { .. }
                | Error::WriteRejected { .. }
                | Error::OutputBufferFull { .. }
                | Error::SessionClaimConflict { .. }
        )
    }

    /// Check if this came from the network layer
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::TransportFailure(_) | Error::Http(_))
    }

    /// Filter status attached to the error, if any
    pub fn status(&self) -> Option<StreamFilterStatus> {
        match self {
            Error::InvalidTransition { status, .. } => Some(*status),
            Error::WriteRejected { status } => Some(*status),
            _ => None,
        }
    }

    /// Request id attached to the error, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Error::SessionClaimConflict { request_id, .. } => Some(request_id),
            Error::RequestNotFound(request_id) => Some(request_id),
            Error::NotEligible { request_id, .. } => Some(request_id),
            Error::DuplicateRequest(request_id) => Some(request_id),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            match err {
                Error::Io(_) | Error::Serialization(_) => Error::Config(format!("{}: {}", msg, err)),
                other => Error::Other(format!("{}: {}", msg, other)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_error() {
        let err = Error::invalid_transition("resume", StreamFilterStatus::Uninitialized);

        assert!(err.is_caller_misuse());
        assert_eq!(err.status(), Some(StreamFilterStatus::Uninitialized));
        assert_eq!(
            err.to_string(),
            "Cannot resume a stream filter in status uninitialized"
        );
    }

    #[test]
    fn test_claim_conflict_error() {
        let err = Error::SessionClaimConflict {
            request_id: RequestId::from("7"),
            owner_id: "addon@example".to_string(),
        };

        assert!(err.is_caller_misuse());
        assert_eq!(err.request_id().map(|id| id.as_str()), Some("7"));
    }

    #[test]
    fn test_transport_error() {
        let err = Error::transport("connection reset");

        assert!(err.is_transport());
        assert!(!err.is_caller_misuse());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));

        let err = result.context("reading filter config").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("reading filter config"));
    }
}
