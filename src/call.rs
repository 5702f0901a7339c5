//! A registered remote procedure and the invocations it has spawned.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::args::CallArgs;
use crate::error::Result;
use crate::invocation::CallInvocation;
use crate::registry::{CallId, InvocationId, Registry};
use crate::session::{ProgressHandler, Session};

pub(crate) struct CallInner {
    id: CallId,
    name: String,
    procedure: String,
    on_progress: Option<ProgressHandler>,
    timeout: Option<Duration>,
    session: Session,
    name_attempts: usize,
    log_failures: bool,
    invocations: Mutex<Registry<InvocationId, CallInvocation>>,
}

/// Settings a call inherits from its manager.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallSettings {
    pub name_attempts: usize,
    pub log_failures: bool,
}

/// Handle to a registered call.
///
/// Cheap to clone. Every `invoke` returns immediately with a
/// [`CallInvocation`] whose fields fill in as the remote call proceeds.
#[derive(Clone)]
pub struct Call {
    inner: Arc<CallInner>,
}

impl Call {
    pub(crate) fn new(
        id: CallId,
        name: &str,
        procedure: String,
        on_progress: Option<ProgressHandler>,
        timeout: Option<Duration>,
        session: Session,
        settings: CallSettings,
    ) -> Self {
        Self {
            inner: Arc::new(CallInner {
                id,
                name: name.to_string(),
                procedure,
                on_progress,
                timeout,
                session,
                name_attempts: settings.name_attempts,
                log_failures: settings.log_failures,
                invocations: Mutex::new(Registry::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<CallInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<CallInner>) -> Option<Call> {
        weak.upgrade().map(|inner| Call { inner })
    }

    pub(crate) fn log_failures(&self) -> bool {
        self.inner.log_failures
    }

    /// Identity within the manager.
    #[inline]
    pub fn id(&self) -> CallId {
        self.inner.id
    }

    /// Assigned name within the manager.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Remote procedure this call targets.
    #[inline]
    pub fn procedure(&self) -> &str {
        &self.inner.procedure
    }

    /// Timeout passed with every invocation.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Check if progress goes to a call-wide callback instead of each
    /// invocation's own sequence.
    pub fn has_progress_handler(&self) -> bool {
        self.inner.on_progress.is_some()
    }

    /// Start a new invocation with the given arguments.
    ///
    /// Returns as soon as the invocation is registered; the remote call
    /// runs in the background once the session is connected.
    pub fn invoke(&self, args: CallArgs) -> Result<CallInvocation> {
        let invocation = self.inner.invocations.lock().insert(
            None,
            self.inner.name_attempts,
            |id, name| CallInvocation::new(id, name, self, args),
        )?;

        invocation.launch(
            &self.inner.session,
            self.inner.on_progress.clone(),
            self.inner.timeout,
        );
        Ok(invocation)
    }

    /// Resolve an invocation by name, or failing that by identity.
    pub fn lookup(&self, identifier: &str) -> Result<CallInvocation> {
        self.inner.invocations.lock().lookup(identifier)
    }

    /// Get an invocation by identity.
    pub fn get(&self, id: InvocationId) -> Option<CallInvocation> {
        self.inner.invocations.lock().get(id)
    }

    /// Names of all invocations, sorted.
    pub fn invocations(&self) -> Vec<String> {
        self.inner.invocations.lock().names()
    }

    /// Number of invocations made so far.
    pub fn invocation_count(&self) -> usize {
        self.inner.invocations.lock().len()
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("procedure", &self.inner.procedure)
            .field("timeout", &self.inner.timeout)
            .field("invocations", &self.invocation_count())
            .finish()
    }
}
