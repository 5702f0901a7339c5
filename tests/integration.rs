//! Integration tests for rpc-repl.
//!
//! These drive the manager, calls and invocations against the in-process
//! loopback peer, the way a shell session would.

use std::sync::Arc;
use std::time::Duration;

use rpc_repl::loopback::{CallContext, LoopbackConnection, INVALID_ARGUMENT};
use rpc_repl::{
    CallArgs, CallManager, Keep, Outcome, Override, RegisterOptions, RemoteCallError, ReplError,
    Session, SessionStatus,
};
use serde_json::{json, Map, Value};

fn peer() -> Arc<LoopbackConnection> {
    Arc::new(
        LoopbackConnection::builder()
            .procedure("math.add", |(a, b): (i64, i64), _ctx| async move {
                Ok(json!(a + b))
            })
            .procedure("count", |(n,): (u32,), ctx: CallContext| async move {
                for i in 1..=n {
                    ctx.progress(&i)?;
                }
                Ok(json!(n))
            })
            .procedure("greet", |(name,): (String,), ctx: CallContext| async move {
                let greeting = ctx
                    .kwargs()
                    .get("greeting")
                    .and_then(Value::as_str)
                    .unwrap_or("hello")
                    .to_string();
                let punctuation = ctx
                    .kwargs()
                    .get("punctuation")
                    .and_then(Value::as_str)
                    .unwrap_or(".")
                    .to_string();
                Ok(json!(format!("{greeting} {name}{punctuation}")))
            })
            .procedure("fail", |_: Vec<Value>, ctx: CallContext| async move {
                Err(ctx.error("app.error.failed", "always fails"))
            })
            .procedure("boom", |(message,): (String,), _ctx| async move {
                if message.is_empty() {
                    return Ok(Value::Null);
                }
                panic!("{message}");
            })
            .procedure("slow", |(ms,): (u64,), _ctx| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!("done"))
            })
            .build(),
    )
}

/// Register `math.add` as `adder`, add, then re-add with a kept argument.
#[tokio::test]
async fn test_adder_scenario() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let adder = calls
        .register("math.add", RegisterOptions::new().name("adder"))
        .unwrap();
    let first = adder.invoke(CallArgs::positional([2, 3])).unwrap();
    assert_eq!(first.wait().await, Outcome::Completed(json!(5)));
    assert_eq!(first.result(), Some(json!(5)));

    let second = first
        .reinvoke([Keep, Override::set(10)], Map::new())
        .unwrap();
    assert_eq!(second.args(), &CallArgs::positional([2, 10]));
    assert_eq!(second.wait().await, Outcome::Completed(json!(12)));

    // The original is untouched
    assert_eq!(first.args(), &CallArgs::positional([2, 3]));
    assert_eq!(first.result(), Some(json!(5)));
}

#[tokio::test]
async fn test_lookup_returns_same_call() {
    let session = Session::new().unwrap();
    let mut calls = CallManager::new(session);

    let adder = calls
        .register("math.add", RegisterOptions::new().name("adder"))
        .unwrap();
    let by_name = calls.lookup("adder").unwrap();
    let by_id = calls.lookup(&adder.id().to_string()).unwrap();

    assert_eq!(by_name.id(), adder.id());
    assert_eq!(by_id.id(), adder.id());

    let invocation = by_name.invoke(CallArgs::positional([1, 1])).unwrap();
    assert_eq!(adder.lookup(invocation.name()).unwrap().id(), invocation.id());
}

#[tokio::test]
async fn test_progress_arrives_in_order() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let counter = calls.register("count", RegisterOptions::new()).unwrap();
    let invocation = counter.invoke(CallArgs::positional([3])).unwrap();

    assert_eq!(invocation.wait().await, Outcome::Completed(json!(3)));
    assert_eq!(invocation.progress(), vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_keyword_override_replaces_only_that_key() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let greet = calls.register("greet", RegisterOptions::new()).unwrap();
    let first = greet
        .invoke(
            CallArgs::positional(["ada"])
                .kwarg("greeting", "hi")
                .kwarg("punctuation", "!"),
        )
        .unwrap();
    assert_eq!(first.wait().await, Outcome::Completed(json!("hi ada!")));

    let mut kwargs = Map::new();
    kwargs.insert("greeting".to_string(), json!("bye"));
    let second = first.reinvoke(Vec::new(), kwargs).unwrap();

    assert_eq!(second.args().kwargs.get("greeting"), Some(&json!("bye")));
    assert_eq!(second.args().kwargs.get("punctuation"), Some(&json!("!")));
    assert_eq!(second.wait().await, Outcome::Completed(json!("bye ada!")));
}

#[tokio::test]
async fn test_all_keep_reinvoke_copies_args() {
    let session = Session::new().unwrap();
    let mut calls = CallManager::new(session);

    let adder = calls.register("math.add", RegisterOptions::new()).unwrap();
    let original = adder
        .invoke(CallArgs::positional([4, 5]).kwarg("trace", json!({"depth": 2})))
        .unwrap();
    let copy = original.reinvoke([Keep, Keep], Map::new()).unwrap();

    assert_eq!(copy.args(), original.args());
    assert_ne!(copy.name(), original.name());
}

#[tokio::test]
async fn test_failures_are_stored_not_returned() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let fail = calls.register("fail", RegisterOptions::new()).unwrap();
    let invocation = fail.invoke(CallArgs::new()).unwrap();
    let outcome = invocation.wait().await;

    assert!(invocation.result().is_none());
    match outcome {
        Outcome::Failed(RemoteCallError::Application { uri, .. }) => {
            assert_eq!(uri, "app.error.failed")
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let bad_args = calls.register("math.add", RegisterOptions::new()).unwrap();
    let invocation = bad_args.invoke(CallArgs::positional(["x"])).unwrap();
    match invocation.wait().await {
        Outcome::Failed(RemoteCallError::Application { uri, .. }) => {
            assert_eq!(uri, INVALID_ARGUMENT)
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let missing = calls.register("math.nope", RegisterOptions::new()).unwrap();
    let invocation = missing.invoke(CallArgs::new()).unwrap();
    assert_eq!(
        invocation.wait().await,
        Outcome::Failed(RemoteCallError::NoSuchProcedure("math.nope".to_string()))
    );
}

#[tokio::test]
async fn test_panicking_handler_still_completes() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let boom = calls.register("boom", RegisterOptions::new()).unwrap();
    let invocation = boom.invoke(CallArgs::positional(["handler bug"])).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), invocation.wait())
        .await
        .expect("invocation never completed");
    assert!(matches!(outcome, Outcome::Failed(RemoteCallError::Transport(_))));
    assert!(invocation.exception().is_some());

    // The peer keeps serving other calls
    let again = boom.invoke(CallArgs::positional([""])).unwrap();
    assert_eq!(again.wait().await, Outcome::Completed(Value::Null));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reported_as_exception() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::builder(session)
        .default_timeout(Duration::from_millis(100))
        .build();

    let slow = calls.register("slow", RegisterOptions::new()).unwrap();
    let invocation = slow.invoke(CallArgs::positional([10_000])).unwrap();

    assert_eq!(
        invocation.wait().await,
        Outcome::Failed(RemoteCallError::Timeout(Duration::from_millis(100)))
    );
    assert!(invocation.result().is_none());
}

#[tokio::test]
async fn test_deferred_start_runs_exactly_once() {
    let session = Session::new().unwrap();
    let connection = peer();
    let mut calls = CallManager::new(session.clone());

    let adder = calls.register("math.add", RegisterOptions::new()).unwrap();
    let invocations: Vec<_> = (0..3)
        .map(|i| adder.invoke(CallArgs::positional([i, i])).unwrap())
        .collect();

    assert_eq!(session.status(), SessionStatus::Connecting);
    assert_eq!(session.pending_starts(), 3);
    assert_eq!(connection.calls_started(), 0);

    session.connect(connection.clone());
    for (i, invocation) in invocations.iter().enumerate() {
        assert_eq!(invocation.wait().await, Outcome::Completed(json!(2 * i)));
    }
    assert_eq!(connection.calls_started(), 3);
    assert_eq!(session.pending_starts(), 0);
}

#[tokio::test]
async fn test_session_close_fails_waiting_invocations() {
    let session = Session::new().unwrap();
    let mut calls = CallManager::new(session.clone());

    let adder = calls.register("math.add", RegisterOptions::new()).unwrap();
    let waiting = adder.invoke(CallArgs::positional([1, 2])).unwrap();
    session.close();

    assert_eq!(
        waiting.wait().await,
        Outcome::Failed(RemoteCallError::ConnectionNotReady)
    );
    assert!(matches!(
        session.wait_ready().await,
        Err(ReplError::ConnectionNotReady)
    ));
}

#[tokio::test]
async fn test_call_wide_progress_callback() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let counter = calls
        .register(
            "count",
            RegisterOptions::new().on_progress(move |value| {
                let _ = tx.send(value);
            }),
        )
        .unwrap();
    assert!(counter.has_progress_handler());

    let invocation = counter.invoke(CallArgs::positional([2])).unwrap();
    invocation.wait().await;

    assert_eq!(rx.recv().await, Some(json!(1)));
    assert_eq!(rx.recv().await, Some(json!(2)));
    assert!(invocation.progress().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_many_invocations_multi_thread() {
    let session = Session::new().unwrap();
    session.connect(peer());
    let mut calls = CallManager::new(session);

    let counter = calls.register("count", RegisterOptions::new()).unwrap();
    let invocations: Vec<_> = (1..=20u32)
        .map(|n| counter.invoke(CallArgs::positional([n])).unwrap())
        .collect();

    for (n, invocation) in (1..=20u32).zip(&invocations) {
        assert_eq!(invocation.wait().await, Outcome::Completed(json!(n)));
        let expected: Vec<Value> = (1..=n).map(|i| json!(i)).collect();
        assert_eq!(invocation.progress(), expected);
    }
    assert_eq!(counter.invocation_count(), 20);
    assert_eq!(counter.invocations().len(), 20);
}
