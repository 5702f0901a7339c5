//! Session: the connection-ready signal and the active connection.
//!
//! Invocations never talk to a connection directly. They hand a pending
//! start to the [`Session`], which either spawns it right away (connected),
//! queues it (connecting) or rejects it (closed). The transition to
//! connected installs the connection and drains the queue under one lock,
//! so an invocation can never observe "ready" without a usable connection.
//!
//! ```text
//! invoke ─► Session::schedule ─┬─ Connected  ─► spawn(call)
//!                              ├─ Connecting ─► pending FIFO ─► connect() drains
//!                              └─ Closed     ─► fail with ConnectionNotReady
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::args::CallArgs;
use crate::error::{RemoteCallError, ReplError, Result};

/// Callback receiving progress values in arrival order.
pub type ProgressHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Boxed future, as returned by pending starts.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Options passed with every remote call.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Receives progressive results, if the caller wants them.
    pub on_progress: Option<ProgressHandler>,
    /// Time allowed for the call. Enforcement is up to the connection.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The remote-call primitive of an established connection.
#[async_trait]
pub trait RpcConnection: Send + Sync + 'static {
    /// Call `procedure` and wait for its final result.
    async fn call(
        &self,
        procedure: &str,
        args: CallArgs,
        options: CallOptions,
    ) -> std::result::Result<Value, RemoteCallError>;
}

/// Work waiting for a usable connection.
pub(crate) trait PendingStart: Send {
    /// Produce the task performing the call over `connection`.
    fn start(self: Box<Self>, connection: Arc<dyn RpcConnection>) -> BoxFuture<'static, ()>;

    /// The session closed before a connection was available.
    fn abandon(self: Box<Self>, error: RemoteCallError);
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Waiting for a connection; invocations are queued.
    Connecting,
    /// A connection is installed; invocations start immediately.
    Connected,
    /// Terminal; invocations fail with `ConnectionNotReady`.
    Closed,
}

enum Link {
    Connecting,
    Connected(Arc<dyn RpcConnection>),
    Closed,
}

struct SessionState {
    link: Link,
    pending: VecDeque<Box<dyn PendingStart>>,
}

struct SessionInner {
    runtime: Handle,
    state: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
}

/// Handle to an RPC session.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session driven by the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ReplError::NoRuntime`] when called outside a runtime.
    pub fn new() -> Result<Self> {
        Ok(Self::with_runtime(Handle::try_current()?))
    }

    /// Create a session driven by the given runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        let (status, _) = watch::channel(SessionStatus::Connecting);
        Self {
            inner: Arc::new(SessionInner {
                runtime,
                state: Mutex::new(SessionState {
                    link: Link::Connecting,
                    pending: VecDeque::new(),
                }),
                status,
            }),
        }
    }

    /// Install an established connection and start everything queued.
    ///
    /// Queued starts run in the order they were scheduled. Connecting a
    /// closed session has no effect.
    pub fn connect(&self, connection: Arc<dyn RpcConnection>) {
        let mut state = self.inner.state.lock();
        if matches!(state.link, Link::Closed) {
            tracing::warn!("Ignoring connect on a closed session");
            return;
        }

        state.link = Link::Connected(connection.clone());
        let drained = state.pending.len();
        for start in state.pending.drain(..) {
            self.inner.runtime.spawn(start.start(connection.clone()));
        }
        self.inner.status.send_replace(SessionStatus::Connected);

        tracing::debug!("Session connected, started {} pending invocations", drained);
    }

    /// Drop the current connection; later invocations wait for `connect`.
    ///
    /// Calls already running keep their connection.
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock();
        if matches!(state.link, Link::Connected(_)) {
            state.link = Link::Connecting;
            self.inner.status.send_replace(SessionStatus::Connecting);
            tracing::debug!("Session disconnected");
        }
    }

    /// Close the session for good.
    ///
    /// Queued invocations fail with `ConnectionNotReady`.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.link = Link::Closed;
        let abandoned: Vec<_> = state.pending.drain(..).collect();
        self.inner.status.send_replace(SessionStatus::Closed);
        drop(state);

        if !abandoned.is_empty() {
            tracing::warn!(
                "Session closed with {} invocations still waiting for a connection",
                abandoned.len()
            );
        }
        for start in abandoned {
            start.abandon(RemoteCallError::ConnectionNotReady);
        }
    }

    /// Current connection state.
    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    /// Check if a connection is installed.
    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    /// Number of invocations waiting for a connection.
    pub fn pending_starts(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Wait until the session is connected.
    ///
    /// # Errors
    ///
    /// Returns [`ReplError::ConnectionNotReady`] if the session is or
    /// becomes closed first.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.inner.status.subscribe();
        let status = match rx
            .wait_for(|s| matches!(s, SessionStatus::Connected | SessionStatus::Closed))
            .await
        {
            Ok(status) => *status,
            Err(_) => SessionStatus::Closed,
        };

        match status {
            SessionStatus::Connected => Ok(()),
            _ => Err(ReplError::ConnectionNotReady),
        }
    }

    /// Run `start` as soon as a connection is usable.
    pub(crate) fn schedule(&self, start: Box<dyn PendingStart>) {
        let mut state = self.inner.state.lock();
        let connection = match &state.link {
            Link::Connected(connection) => Ok(Some(connection.clone())),
            Link::Connecting => Ok(None),
            Link::Closed => Err(RemoteCallError::ConnectionNotReady),
        };

        match connection {
            Ok(Some(connection)) => {
                drop(state);
                self.inner.runtime.spawn(start.start(connection));
            }
            Ok(None) => state.pending.push_back(start),
            Err(error) => {
                drop(state);
                tracing::warn!("Invocation rejected: session is closed");
                start.abandon(error);
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("pending_starts", &self.pending_starts())
            .finish()
    }
}
