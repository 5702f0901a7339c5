//! Error types for rpc-repl.
//!
//! Two families:
//! - [`ReplError`] is returned synchronously from registry and session APIs.
//! - [`RemoteCallError`] describes why a remote call failed. It is never
//!   returned from `invoke`; it is stored on the invocation instead.

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

/// Main error type for all rpc-repl operations.
#[derive(Debug, Error)]
pub enum ReplError {
    /// Nothing registered under the given name or identity.
    #[error("No {kind} registered under '{key}'")]
    NotFound {
        /// Registry kind ("call" or "invocation").
        kind: &'static str,
        /// The identifier that failed to resolve.
        key: String,
    },

    /// The bounded name generation loop ran out of attempts.
    #[error("Could not generate a unique {kind} name after {attempts} attempts")]
    NameGeneration {
        /// Registry kind ("call" or "invocation").
        kind: &'static str,
        /// Number of candidates tried.
        attempts: usize,
    },

    /// A `Keep` marker was given for a position with no original argument.
    #[error("Keep at position {position} has no original argument to keep")]
    KeepOutOfRange {
        /// Zero-based positional index.
        position: usize,
    },

    /// The call owning an invocation has been dropped.
    #[error("Call '{0}' has been released")]
    CallReleased(String),

    /// The session was closed and will never become ready.
    #[error("Connection not ready: session is closed")]
    ConnectionNotReady,

    /// No tokio runtime to drive remote calls.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// JSON conversion error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ReplError.
pub type Result<T> = std::result::Result<T, ReplError>;

/// Failure of a single remote call, as stored on its invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteCallError {
    /// The remote procedure raised an application error.
    #[error("Remote error {uri}")]
    Application {
        /// Error URI, e.g. `wamp.error.invalid_argument`.
        uri: String,
        /// Positional error payload.
        args: Vec<Value>,
        /// Keyword error payload.
        kwargs: Map<String, Value>,
    },

    /// The configured timeout elapsed before a result arrived.
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed or refused the call.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer has no procedure registered under this name.
    #[error("No procedure registered under '{0}'")]
    NoSuchProcedure(String),

    /// The session closed before the call could start.
    #[error("Connection not ready")]
    ConnectionNotReady,
}

impl RemoteCallError {
    /// Build an application error carrying a single message argument.
    pub fn application(uri: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteCallError::Application {
            uri: uri.into(),
            args: vec![Value::String(message.into())],
            kwargs: Map::new(),
        }
    }
}
