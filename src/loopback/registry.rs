//! Procedure registry for the loopback connection.
//!
//! Maps procedure names to handlers. Handlers take their positional
//! arguments decoded from a JSON array, so a two-argument procedure is
//! typically written against a tuple.
//!
//! # Example
//!
//! ```ignore
//! let mut registry = ProcedureRegistry::new();
//!
//! registry.register("math.add", |(a, b): (i64, i64), _ctx| async move {
//!     Ok(json!(a + b))
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::CallContext;
use crate::error::RemoteCallError;
use crate::session::BoxFuture;

/// Result type for handler functions.
pub type HandlerResult = Result<Value, RemoteCallError>;

/// Error URI reported when arguments do not fit the handler.
pub const INVALID_ARGUMENT: &str = "wamp.error.invalid_argument";

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle a call with raw positional arguments.
    fn call(&self, args: Vec<Value>, ctx: CallContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that decodes positional arguments before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, args: Vec<Value>, ctx: CallContext) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match serde_json::from_value(Value::Array(args)) {
            Ok(v) => v,
            Err(e) => {
                let err = RemoteCallError::application(INVALID_ARGUMENT, e.to_string());
                return Box::pin(async move { Err(err) });
            }
        };

        Box::pin((self.handler)(parsed, ctx))
    }
}

/// Registry mapping procedure names to handlers.
#[derive(Default)]
pub struct ProcedureRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl ProcedureRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for `procedure`.
    pub fn register<F, T, Fut>(&mut self, procedure: &str, handler: F)
    where
        F: Fn(T, CallContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers
            .insert(procedure.to_string(), Box::new(TypedHandler::new(handler)));
    }

    /// Get a handler by procedure name.
    pub fn get(&self, procedure: &str) -> Option<&dyn Handler> {
        self.handlers.get(procedure).map(|h| h.as_ref())
    }

    /// Registered procedure names, sorted.
    pub fn procedures(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Dispatch a call to the handler registered for `procedure`.
    pub async fn dispatch(
        &self,
        procedure: &str,
        args: Vec<Value>,
        ctx: CallContext,
    ) -> HandlerResult {
        let handler = self
            .get(procedure)
            .ok_or_else(|| RemoteCallError::NoSuchProcedure(procedure.to_string()))?;

        handler.call(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_procedure() {
        let mut registry = ProcedureRegistry::new();

        registry.register("echo", |(s,): (String,), _ctx| async move { Ok(json!(s)) });

        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.procedures(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_dispatch_decodes_tuple() {
        let mut registry = ProcedureRegistry::new();
        registry.register("math.add", |(a, b): (i64, i64), _ctx| async move {
            Ok(json!(a + b))
        });

        let result = registry
            .dispatch(
                "math.add",
                vec![json!(2), json!(3)],
                CallContext::new("math.add", 1),
            )
            .await;
        assert_eq!(result, Ok(json!(5)));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_argument() {
        let mut registry = ProcedureRegistry::new();
        registry.register("math.add", |(a, b): (i64, i64), _ctx| async move {
            Ok(json!(a + b))
        });

        let result = registry
            .dispatch(
                "math.add",
                vec![json!("two"), json!(3)],
                CallContext::new("math.add", 1),
            )
            .await;
        match result {
            Err(RemoteCallError::Application { uri, .. }) => assert_eq!(uri, INVALID_ARGUMENT),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_procedure() {
        let registry = ProcedureRegistry::new();
        let result = registry
            .dispatch("missing", Vec::new(), CallContext::new("missing", 1))
            .await;
        assert_eq!(
            result,
            Err(RemoteCallError::NoSuchProcedure("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_raw_value_handler() {
        let mut registry = ProcedureRegistry::new();
        registry.register("len", |args: Vec<Value>, _ctx| async move {
            Ok(json!(args.len()))
        });

        let result = registry
            .dispatch("len", vec![json!(1), json!(null)], CallContext::new("len", 1))
            .await;
        assert_eq!(result, Ok(json!(2)));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProcedureRegistry::new();
        registry.register("p", |_: Vec<Value>, _ctx| async { Ok(json!(1)) });
        registry.register("p", |_: Vec<Value>, _ctx| async { Ok(json!(2)) });
        assert_eq!(registry.procedures().len(), 1);
    }
}
