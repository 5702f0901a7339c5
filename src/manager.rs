//! Call manager: the per-session registry of named calls.
//!
//! The [`CallManagerBuilder`] provides a fluent API for configuring how
//! calls are named, timed out and logged.
//!
//! # Example
//!
//! ```ignore
//! use rpc_repl::{CallArgs, CallManager, RegisterOptions, Session};
//!
//! let session = Session::new()?;
//! let mut calls = CallManager::builder(session.clone())
//!     .default_timeout(Duration::from_secs(5))
//!     .build();
//!
//! let adder = calls.register("math.add", RegisterOptions::new().name("adder"))?;
//! let sum = adder.invoke(CallArgs::positional([2, 3]))?;
//!
//! // Later, from the shell
//! let adder = calls.lookup("adder")?;
//! ```

use std::time::Duration;

use serde_json::Value;

use crate::call::{Call, CallSettings};
use crate::error::Result;
use crate::names::DEFAULT_NAME_ATTEMPTS;
use crate::registry::{CallId, Registry};
use crate::session::{ProgressHandler, Session};

/// Manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Candidates tried when generating a unique name.
    pub name_attempts: usize,
    /// Timeout for calls registered without one.
    pub default_timeout: Option<Duration>,
    /// Log every failed invocation at `warn`.
    pub log_failures: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name_attempts: DEFAULT_NAME_ATTEMPTS,
            default_timeout: None,
            log_failures: true,
        }
    }
}

/// Options for [`CallManager::register`].
#[derive(Clone, Default)]
pub struct RegisterOptions {
    /// Preferred name; a fresh one is generated if omitted or taken.
    pub name: Option<String>,
    /// Call-wide progress callback.
    pub on_progress: Option<ProgressHandler>,
    /// Timeout passed with every invocation.
    pub timeout: Option<Duration>,
}

impl RegisterOptions {
    /// Create options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Send progress values to `handler` instead of each invocation's
    /// own sequence.
    pub fn on_progress<F>(mut self, handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.on_progress = Some(std::sync::Arc::new(handler));
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for RegisterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterOptions")
            .field("name", &self.name)
            .field("on_progress", &self.on_progress.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for configuring and creating a [`CallManager`].
pub struct CallManagerBuilder {
    session: Session,
    config: ManagerConfig,
}

impl CallManagerBuilder {
    /// Create a new builder bound to `session`.
    pub fn new(session: Session) -> Self {
        Self {
            session,
            config: ManagerConfig::default(),
        }
    }

    /// Set the number of candidates tried when generating names.
    ///
    /// Invocations always take a generated name, so at least one candidate
    /// is tried. Default: 64
    pub fn name_attempts(mut self, attempts: usize) -> Self {
        self.config.name_attempts = attempts.max(1);
        self
    }

    /// Set the timeout for calls registered without one.
    ///
    /// Default: none
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Enable or disable `warn` logs for failed invocations.
    ///
    /// Default: enabled
    pub fn log_failures(mut self, enabled: bool) -> Self {
        self.config.log_failures = enabled;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the manager.
    pub fn build(mut self) -> CallManager {
        self.config.name_attempts = self.config.name_attempts.max(1);
        CallManager {
            session: self.session,
            config: self.config,
            calls: Registry::new(),
        }
    }
}

/// Registry of named calls bound to one session.
pub struct CallManager {
    session: Session,
    config: ManagerConfig,
    calls: Registry<CallId, Call>,
}

impl CallManager {
    /// Create a manager with the default configuration.
    pub fn new(session: Session) -> Self {
        CallManagerBuilder::new(session).build()
    }

    /// Create a new manager builder.
    pub fn builder(session: Session) -> CallManagerBuilder {
        CallManagerBuilder::new(session)
    }

    /// Session the calls are made over.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register `procedure` as a new call.
    ///
    /// If no name is given, or the given name is taken, a fresh unique
    /// name is generated.
    ///
    /// # Errors
    ///
    /// Returns [`ReplError::NameGeneration`](crate::ReplError::NameGeneration)
    /// if no unique name could be found.
    pub fn register(
        &mut self,
        procedure: impl Into<String>,
        options: RegisterOptions,
    ) -> Result<Call> {
        let procedure = procedure.into();
        let RegisterOptions {
            name,
            on_progress,
            timeout,
        } = options;

        let settings = CallSettings {
            name_attempts: self.config.name_attempts,
            log_failures: self.config.log_failures,
        };
        let timeout = timeout.or(self.config.default_timeout);
        let session = self.session.clone();

        let call = self.calls.insert(
            name.as_deref(),
            self.config.name_attempts,
            |id, name| {
                Call::new(
                    id,
                    name,
                    procedure.clone(),
                    on_progress,
                    timeout,
                    session,
                    settings,
                )
            },
        )?;

        tracing::info!(
            "Generating call to {} with name {}",
            call.procedure(),
            call.name()
        );
        Ok(call)
    }

    /// Resolve a call by name, or failing that by identity.
    pub fn lookup(&self, identifier: &str) -> Result<Call> {
        self.calls.lookup(identifier)
    }

    /// Get a call by identity.
    pub fn get(&self, id: CallId) -> Option<Call> {
        self.calls.get(id)
    }

    /// Names of all calls, sorted.
    pub fn names(&self) -> Vec<String> {
        self.calls.names()
    }

    /// Number of registered calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Check if no calls are registered.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl std::fmt::Debug for CallManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallManager")
            .field("session", &self.session)
            .field("config", &self.config)
            .field("calls", &self.calls.names())
            .finish()
    }
}
