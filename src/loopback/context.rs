//! Call context for loopback handlers.
//!
//! Provides:
//! - `progress` - push a progressive result to the caller
//! - `kwargs` - keyword arguments of the call
//! - `error` - build an application error to return
//!
//! # Example
//!
//! ```ignore
//! async fn countdown(from: (u32,), ctx: CallContext) -> HandlerResult {
//!     for n in (1..=from.0).rev() {
//!         ctx.progress(&n)?;
//!     }
//!     Ok(json!("liftoff"))
//! }
//! ```

use serde_json::{Map, Value};

use crate::error::RemoteCallError;
use crate::session::ProgressHandler;

/// Context passed to loopback handlers.
///
/// `CallContext` is `Clone` and can be moved into tasks spawned by the
/// handler.
#[derive(Clone)]
pub struct CallContext {
    /// Procedure being called.
    procedure: String,
    /// Request ID assigned by the connection.
    request_id: u64,
    /// Keyword arguments of the call.
    kwargs: Map<String, Value>,
    /// Caller's progress handler, if any.
    on_progress: Option<ProgressHandler>,
}

impl CallContext {
    /// Create a context with no progress handler (for testing).
    pub fn new(procedure: &str, request_id: u64) -> Self {
        Self {
            procedure: procedure.to_string(),
            request_id,
            kwargs: Map::new(),
            on_progress: None,
        }
    }

    /// Create a context for a dispatched call.
    pub(crate) fn for_call(
        procedure: &str,
        request_id: u64,
        kwargs: Map<String, Value>,
        on_progress: Option<ProgressHandler>,
    ) -> Self {
        Self {
            procedure: procedure.to_string(),
            request_id,
            kwargs,
            on_progress,
        }
    }

    /// Get the procedure name.
    #[inline]
    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    /// Get the request ID.
    #[inline]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Keyword arguments of the call.
    #[inline]
    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    /// Check if the caller asked for progressive results.
    pub fn wants_progress(&self) -> bool {
        self.on_progress.is_some()
    }

    /// Send a progressive result.
    ///
    /// Does nothing if the caller has no progress handler.
    pub fn progress<T: serde::Serialize>(&self, value: &T) -> Result<(), RemoteCallError> {
        let Some(on_progress) = &self.on_progress else {
            return Ok(());
        };
        let value = serde_json::to_value(value)
            .map_err(|e| RemoteCallError::Transport(format!("progress encode: {}", e)))?;
        on_progress(value);
        Ok(())
    }

    /// Build an application error for this call.
    pub fn error(&self, uri: &str, message: &str) -> RemoteCallError {
        RemoteCallError::application(uri, message)
    }
}
