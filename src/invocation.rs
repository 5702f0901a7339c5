//! One invocation of a registered call.
//!
//! A [`CallInvocation`] is returned by [`Call::invoke`] before the remote
//! call has even started. Its progress sequence and outcome fill in as the
//! call proceeds; both live in `watch` channels so they can be read from any
//! thread while the call runs.
//!
//! # Example
//!
//! ```ignore
//! let first = adder.invoke(CallArgs::positional([2, 3]))?;
//! assert_eq!(first.wait().await, Outcome::Completed(json!(5)));
//!
//! // Same first argument, new second argument
//! let second = first.reinvoke([Keep, Override::set(10)], Map::new())?;
//! assert_eq!(second.args(), &CallArgs::positional([2, 10]));
//! ```

use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::args::{CallArgs, Override};
use crate::call::{Call, CallInner};
use crate::error::{RemoteCallError, ReplError, Result};
use crate::registry::InvocationId;
use crate::session::{
    BoxFuture, CallOptions, PendingStart, ProgressHandler, RpcConnection, Session,
};

/// State of an invocation's final value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The call has not finished.
    Pending,
    /// The call returned a result.
    Completed(Value),
    /// The call failed.
    Failed(RemoteCallError),
}

impl Outcome {
    /// Check if the call has not finished yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    /// The result, if the call succeeded.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Outcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// The error, if the call failed.
    pub fn exception(&self) -> Option<&RemoteCallError> {
        match self {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

struct InvocationShared {
    id: InvocationId,
    name: String,
    call_name: String,
    procedure: String,
    /// Owning call, not kept alive by the invocation.
    call: Weak<CallInner>,
    args: CallArgs,
    log_failures: bool,
    progress: watch::Sender<Vec<Value>>,
    outcome: watch::Sender<Outcome>,
}

impl InvocationShared {
    /// Record the final outcome. Only the first completion is kept.
    fn complete(&self, outcome: Outcome) {
        let failure = outcome.exception().map(ToString::to_string);

        let applied = self.outcome.send_if_modified(|current| {
            if current.is_pending() {
                *current = outcome;
                true
            } else {
                false
            }
        });

        if !applied {
            tracing::warn!("Ignoring second completion of invocation {}", self.name);
            return;
        }

        match failure {
            Some(error) if self.log_failures => tracing::warn!(
                "Invocation {} of {} ({}) failed: {}",
                self.name,
                self.call_name,
                self.procedure,
                error
            ),
            _ => tracing::debug!("Invocation {} of {} completed", self.name, self.call_name),
        }
    }
}

/// Handle to one invocation. Clones share the same state.
#[derive(Clone)]
pub struct CallInvocation {
    shared: Arc<InvocationShared>,
}

impl CallInvocation {
    pub(crate) fn new(id: InvocationId, name: &str, call: &Call, args: CallArgs) -> Self {
        let (progress, _) = watch::channel(Vec::new());
        let (outcome, _) = watch::channel(Outcome::Pending);

        Self {
            shared: Arc::new(InvocationShared {
                id,
                name: name.to_string(),
                call_name: call.name().to_string(),
                procedure: call.procedure().to_string(),
                call: call.downgrade(),
                args,
                log_failures: call.log_failures(),
                progress,
                outcome,
            }),
        }
    }

    /// Hand the invocation to the session to start once connected.
    pub(crate) fn launch(
        &self,
        session: &Session,
        on_progress: Option<ProgressHandler>,
        timeout: Option<std::time::Duration>,
    ) {
        let on_progress = on_progress.unwrap_or_else(|| self.progress_recorder());
        let launch = Launch {
            invocation: self.shared.clone(),
            options: CallOptions {
                on_progress: Some(on_progress),
                timeout,
            },
        };
        session.schedule(Box::new(launch));
    }

    /// Progress handler appending to this invocation's own sequence.
    fn progress_recorder(&self) -> ProgressHandler {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |value: Value| {
            if let Some(shared) = shared.upgrade() {
                shared.progress.send_modify(|progress| progress.push(value));
            }
        })
    }

    /// Identity within the owning call.
    #[inline]
    pub fn id(&self) -> InvocationId {
        self.shared.id
    }

    /// Assigned name within the owning call.
    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Procedure being called.
    #[inline]
    pub fn procedure(&self) -> &str {
        &self.shared.procedure
    }

    /// Captured arguments.
    #[inline]
    pub fn args(&self) -> &CallArgs {
        &self.shared.args
    }

    /// The owning call, if it is still registered.
    pub fn call(&self) -> Option<Call> {
        Call::upgrade(&self.shared.call)
    }

    /// Progress values received so far, in arrival order.
    ///
    /// Stays empty when the call was registered with its own progress
    /// callback.
    pub fn progress(&self) -> Vec<Value> {
        self.shared.progress.borrow().clone()
    }

    /// Live view of the progress sequence.
    pub fn subscribe_progress(&self) -> watch::Receiver<Vec<Value>> {
        self.shared.progress.subscribe()
    }

    /// Current outcome.
    pub fn outcome(&self) -> Outcome {
        self.shared.outcome.borrow().clone()
    }

    /// The result, once the call has succeeded.
    pub fn result(&self) -> Option<Value> {
        self.shared.outcome.borrow().result().cloned()
    }

    /// The error, once the call has failed.
    pub fn exception(&self) -> Option<RemoteCallError> {
        self.shared.outcome.borrow().exception().cloned()
    }

    /// Check if the call has finished.
    pub fn is_done(&self) -> bool {
        !self.shared.outcome.borrow().is_pending()
    }

    /// Decode the result into `T`.
    ///
    /// Returns `Ok(None)` until the call has succeeded.
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match self.result() {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Wait for the final outcome.
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.shared.outcome.subscribe();
        let finished = rx.wait_for(|outcome| !outcome.is_pending()).await;
        match finished {
            Ok(outcome) => outcome.clone(),
            Err(_) => self.outcome(),
        }
    }

    /// Invoke the owning call again with some arguments replaced.
    ///
    /// `Keep` retains the original positional argument; keyword overrides
    /// replace or add keys. This invocation is left untouched.
    ///
    /// # Errors
    ///
    /// - [`ReplError::CallReleased`] if the owning call no longer exists
    /// - [`ReplError::KeepOutOfRange`] for a `Keep` with nothing to keep
    pub fn reinvoke(
        &self,
        overrides: impl IntoIterator<Item = Override>,
        kwargs: Map<String, Value>,
    ) -> Result<CallInvocation> {
        let call = self
            .call()
            .ok_or_else(|| ReplError::CallReleased(self.shared.call_name.clone()))?;
        let args = self.shared.args.with_overrides(overrides, kwargs)?;
        call.invoke(args)
    }

    /// Invoke the owning call again with identical arguments.
    pub fn repeat(&self) -> Result<CallInvocation> {
        self.reinvoke(Vec::new(), Map::new())
    }
}

impl std::fmt::Debug for CallInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallInvocation")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("procedure", &self.shared.procedure)
            .field("args", &self.shared.args)
            .field("outcome", &*self.shared.outcome.borrow())
            .finish()
    }
}

/// Pending start of one invocation.
struct Launch {
    invocation: Arc<InvocationShared>,
    options: CallOptions,
}

impl PendingStart for Launch {
    fn start(self: Box<Self>, connection: Arc<dyn RpcConnection>) -> BoxFuture<'static, ()> {
        let Launch {
            invocation,
            options,
        } = *self;

        Box::pin(async move {
            let _unfinished = Unfinished(invocation.clone());
            tracing::debug!(
                "Calling {} for invocation {}",
                invocation.procedure,
                invocation.name
            );

            let outcome = match connection
                .call(&invocation.procedure, invocation.args.clone(), options)
                .await
            {
                Ok(value) => Outcome::Completed(value),
                Err(error) => Outcome::Failed(error),
            };
            invocation.complete(outcome);
        })
    }

    fn abandon(self: Box<Self>, error: RemoteCallError) {
        self.invocation.complete(Outcome::Failed(error));
    }
}

/// Fails the invocation if the call future is dropped before completing,
/// which includes a panic while it is polled.
struct Unfinished(Arc<InvocationShared>);

impl Drop for Unfinished {
    fn drop(&mut self) {
        if self.0.outcome.borrow().is_pending() {
            self.0.complete(Outcome::Failed(RemoteCallError::Transport(
                "remote call ended without a result".to_string(),
            )));
        }
    }
}
