//! Adder - a scripted shell session against the loopback peer.
//!
//! This demo shows:
//! - Registering a procedure under a short name
//! - Invoking before the session is connected
//! - Re-invoking with `Keep` and keyword overrides
//! - Reading progress, results and exceptions
//!
//! # Running
//!
//! ```text
//! RUST_LOG=rpc_repl=debug cargo run --example adder
//! ```

use std::sync::Arc;
use std::time::Duration;

use rpc_repl::loopback::{CallContext, LoopbackConnection};
use rpc_repl::{CallArgs, CallManager, Keep, Override, RegisterOptions, Session};
use serde_json::{json, Map};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rpc_repl=info")),
        )
        .init();

    let session = Session::new()?;
    let mut calls = CallManager::builder(session.clone())
        .default_timeout(Duration::from_secs(2))
        .build();

    let adder = calls.register("math.add", RegisterOptions::new().name("adder"))?;
    let countdown = calls.register("countdown", RegisterOptions::new())?;

    // Queued until the session connects
    let sum = adder.invoke(CallArgs::positional([2, 3]))?;
    println!("{} queued: done={}", sum.name(), sum.is_done());

    let peer = LoopbackConnection::builder()
        .procedure("math.add", |(a, b): (i64, i64), ctx: CallContext| async move {
            let scale = ctx.kwargs().get("scale").and_then(|v| v.as_i64()).unwrap_or(1);
            Ok(json!((a + b) * scale))
        })
        .procedure("countdown", |(from,): (u32,), ctx: CallContext| async move {
            for n in (1..=from).rev() {
                ctx.progress(&n)?;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(json!("liftoff"))
        })
        .build();
    session.connect(Arc::new(peer));

    println!("{} -> {:?}", sum.name(), sum.wait().await);

    let mut scale = Map::new();
    scale.insert("scale".to_string(), json!(3));
    let again = sum.reinvoke([Keep, Override::set(10)], scale)?;
    println!("{} {:?} -> {:?}", again.name(), again.args(), again.wait().await);

    let launch = countdown.invoke(CallArgs::positional([3]))?;
    launch.wait().await;
    println!("{} progress={:?} result={:?}", launch.name(), launch.progress(), launch.result());

    let broken = adder.invoke(CallArgs::new().arg("two").arg(2))?;
    broken.wait().await;
    println!("{} exception={:?}", broken.name(), broken.exception());

    // Everything is still reachable by name
    for name in calls.names() {
        let call = calls.lookup(&name)?;
        println!("{} ({}): {:?}", name, call.procedure(), call.invocations());
    }

    Ok(())
}
