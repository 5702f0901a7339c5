//! # rpc-repl
//!
//! Interactive call registry for issuing remote procedure calls over an
//! existing RPC session.
//!
//! This crate is meant to be driven from a shell or a small driver program:
//! register a remote procedure under a short local name, invoke it, re-invoke
//! an earlier invocation with a few arguments changed, and inspect results,
//! progress and errors as they arrive.
//!
//! ## Architecture
//!
//! - **[`CallManager`]**: named [`Call`]s bound to one [`Session`]
//! - **[`Call`]**: a procedure plus call-wide defaults, owns its invocations
//! - **[`CallInvocation`]**: one call with concrete arguments; result,
//!   progress and exception fill in asynchronously
//! - **[`Session`]**: holds invocations until a connection is ready
//! - **[`RpcConnection`]**: the remote-call primitive; bring your own or use
//!   the in-process [`loopback`] peer
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use rpc_repl::loopback::LoopbackConnection;
//! use rpc_repl::{CallArgs, CallManager, Keep, Override, RegisterOptions, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new()?;
//!     let mut calls = CallManager::new(session.clone());
//!
//!     let adder = calls.register("math.add", RegisterOptions::new().name("adder"))?;
//!     let sum = adder.invoke(CallArgs::positional([2, 3]))?;
//!
//!     session.connect(Arc::new(
//!         LoopbackConnection::builder()
//!             .procedure("math.add", |(a, b): (i64, i64), _ctx| async move {
//!                 Ok(serde_json::json!(a + b))
//!             })
//!             .build(),
//!     ));
//!
//!     sum.wait().await;
//!     let again = sum.reinvoke([Keep, Override::set(10)], Default::default())?;
//!     println!("{:?}", again.wait().await);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loopback;
pub mod names;

mod args;
mod call;
mod invocation;
mod manager;
mod registry;
mod session;

pub use args::{CallArgs, Override, Override::Keep};
pub use call::Call;
pub use error::{RemoteCallError, ReplError, Result};
pub use invocation::{CallInvocation, Outcome};
pub use manager::{CallManager, CallManagerBuilder, ManagerConfig, RegisterOptions};
pub use registry::{CallId, InvocationId, RegistryKey};
pub use session::{BoxFuture, CallOptions, ProgressHandler, RpcConnection, Session, SessionStatus};
