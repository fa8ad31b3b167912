//! Error types shared by the server gateway and the model library.
//!
//! Every variant carries enough context to build a log entry or a user-facing
//! message. Nothing in this crate retries or swallows these; they surface to
//! the immediate caller.

use thiserror::Error;

/// Errors produced while talking to the model server or managing the
/// persisted model library.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The server could not be reached at all (liveness failure).
    #[error("model server unreachable at {endpoint}: {reason}")]
    ServerUnreachable { endpoint: String, reason: String },

    /// A network-level failure in the middle of a request.
    #[error("transport error for {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The server understood the request but declined it (e.g. model not loaded).
    #[error("request rejected (HTTP {status}): {body}")]
    RequestRejected { status: u16, body: String },

    /// The caller supplied a parameter outside the recognized set, or a
    /// recognized one with a value of the wrong shape.
    #[error("invalid request parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    /// The identifier is not present in the model library.
    #[error("unknown model: '{identifier}'")]
    UnknownModel { identifier: String },

    /// A record (or its identifier) breaks a library invariant.
    #[error("invalid model record '{identifier}': {reason}")]
    InvalidRecord { identifier: String, reason: String },

    /// The persisted model library could not be parsed.
    #[error("corrupt model library {path}: {reason}")]
    CorruptConfiguration { path: String, reason: String },

    /// The model library could not be read from or written to disk.
    #[error("model library storage error for {path}: {reason}")]
    Storage { path: String, reason: String },

    /// A 2xx response whose body lacks the expected `choices`/`data`.
    #[error("malformed server response: {reason}")]
    MalformedResponse { reason: String },

    /// Connection settings could not be loaded.
    #[error("settings error: {reason}")]
    Settings { reason: String },

    /// Model selection was asked to pick from an empty list.
    #[error("no models available")]
    NoModelsAvailable,

    /// A specific model was requested but is not among the candidates.
    #[error("model '{name}' is not available")]
    ModelNotFound { name: String },
}

impl ConnectError {
    /// Whether this error means the server is down rather than the request being bad.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ConnectError::ServerUnreachable { .. } | ConnectError::Transport { .. }
        )
    }

    /// Whether this error was raised locally, before any network round trip.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ConnectError::InvalidParameter { .. }
                | ConnectError::UnknownModel { .. }
                | ConnectError::InvalidRecord { .. }
                | ConnectError::CorruptConfiguration { .. }
                | ConnectError::Storage { .. }
                | ConnectError::Settings { .. }
                | ConnectError::NoModelsAvailable
                | ConnectError::ModelNotFound { .. }
        )
    }

    /// Extract the server's error body, if this is a `RequestRejected`.
    pub fn rejection_body(&self) -> Option<&str> {
        match self {
            ConnectError::RequestRejected { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ConnectError>;
