//! In-process RPC peer.
//!
//! [`LoopbackConnection`] implements [`RpcConnection`] by dispatching calls
//! to handlers registered in the same process. It is what the shell talks to
//! when no router is available, and what the tests drive.
//!
//! Provides:
//! - [`LoopbackBuilder`] - registers procedures and limits
//! - [`ProcedureRegistry`] - maps procedure names to handlers
//! - [`CallContext`] - lets handlers push progress and build errors
//!
//! # Example
//!
//! ```ignore
//! let peer = LoopbackConnection::builder()
//!     .procedure("math.add", |(a, b): (i64, i64), _ctx| async move {
//!         Ok(json!(a + b))
//!     })
//!     .procedure("count", |(n,): (u32,), ctx: CallContext| async move {
//!         for i in 1..=n {
//!             ctx.progress(&i)?;
//!         }
//!         Ok(json!(n))
//!     })
//!     .build();
//!
//! session.connect(Arc::new(peer));
//! ```

mod context;
mod registry;

pub use context::CallContext;
pub use registry::{Handler, HandlerResult, ProcedureRegistry, TypedHandler, INVALID_ARGUMENT};

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::args::CallArgs;
use crate::error::RemoteCallError;
use crate::session::{CallOptions, RpcConnection};

/// Default maximum concurrent calls.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 256;

/// Builder for configuring and creating a [`LoopbackConnection`].
pub struct LoopbackBuilder {
    registry: ProcedureRegistry,
    max_concurrent_calls: usize,
}

impl LoopbackBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: ProcedureRegistry::new(),
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }

    /// Register a procedure handler.
    ///
    /// The handler receives the positional arguments decoded into `T` and a
    /// context for progress and keyword arguments.
    pub fn procedure<F, T, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.registry.register(name, handler);
        self
    }

    /// Set the maximum number of calls in flight.
    ///
    /// When this limit is reached, new calls fail with a transport error.
    /// Values above [`Semaphore::MAX_PERMITS`] are capped.
    /// Default: 256
    pub fn max_concurrent_calls(mut self, limit: usize) -> Self {
        self.max_concurrent_calls = limit;
        self
    }

    /// Build the connection.
    pub fn build(self) -> LoopbackConnection {
        let permits = self.max_concurrent_calls.min(Semaphore::MAX_PERMITS);
        LoopbackConnection {
            registry: self.registry,
            semaphore: Arc::new(Semaphore::new(permits)),
            next_request_id: AtomicU64::new(1),
            calls_started: AtomicU64::new(0),
        }
    }
}

impl Default for LoopbackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RPC peer running handlers in-process.
pub struct LoopbackConnection {
    /// Registered procedures.
    registry: ProcedureRegistry,
    /// Limits calls in flight.
    semaphore: Arc<Semaphore>,
    /// Next request ID to assign.
    next_request_id: AtomicU64,
    /// Calls that reached a handler.
    calls_started: AtomicU64,
}

impl LoopbackConnection {
    /// Create a new connection builder.
    pub fn builder() -> LoopbackBuilder {
        LoopbackBuilder::new()
    }

    /// Registered procedure names, sorted.
    pub fn procedures(&self) -> Vec<String> {
        self.registry.procedures()
    }

    /// Number of calls dispatched to a handler so far.
    pub fn calls_started(&self) -> u64 {
        self.calls_started.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RpcConnection for LoopbackConnection {
    async fn call(
        &self,
        procedure: &str,
        args: CallArgs,
        options: CallOptions,
    ) -> Result<Value, RemoteCallError> {
        // Permit is held until the handler completes
        let _permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!("Loopback capacity reached, refusing call to {}", procedure);
                return Err(RemoteCallError::Transport(
                    "loopback capacity reached".to_string(),
                ));
            }
        };

        let request_id = self.next_request_id.fetch_add(1, Ordering::AcqRel);
        let ctx = CallContext::for_call(procedure, request_id, args.kwargs, options.on_progress);

        self.calls_started.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("Loopback request {} for {}", request_id, procedure);

        let dispatch = self.registry.dispatch(procedure, args.args, ctx);
        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, dispatch)
                .await
                .unwrap_or(Err(RemoteCallError::Timeout(timeout))),
            None => dispatch.await,
        }
    }
}
