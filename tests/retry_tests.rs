//! Tests for the whole-run retry wrapper.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use common::{MockProvider, MockWorkspace};
use testsmith::agent::{AgentLoop, ContextManager, LoopSettings};
use testsmith::error::{AgentError, FailureKind};
use testsmith::tools::ToolRegistry;
use testsmith::types::{AssistantTurn, ToolCall, Turn};
use testsmith::util::{run_task, RetryPolicy};

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        multiplier: 2.0,
    }
}

/// Records what every attempt was built from.
#[derive(Default)]
struct Attempts {
    context_ids: Vec<Uuid>,
    providers: Vec<Arc<MockProvider>>,
}

#[tokio::test(start_paused = true)]
async fn retries_use_a_fresh_conversation_and_provider() {
    let workspace = MockWorkspace::new().with_file("a.txt", "alpha");
    let registry = Arc::new(ToolRegistry::new().with_host(workspace));
    let attempts = Arc::new(Mutex::new(Attempts::default()));

    let recorder = attempts.clone();
    let outcome = run_task(
        &fast_policy(3),
        |attempt| {
            let provider = Arc::new(MockProvider::new());
            if attempt == 0 {
                // The first attempt gets as far as a tool call, then the transport fails.
                provider.queue_tool_call("call_1", "read_file", json!({"path": "a.txt"}));
                provider.queue_error(AgentError::transport(502, "bad gateway"));
            } else {
                provider.queue_text("All tests written.");
            }

            let mut context = ContextManager::new(50);
            context.set_system("You write unit tests.");
            let mut log = recorder.lock().unwrap();
            log.context_ids.push(context.id());
            log.providers.push(provider.clone());

            Ok(AgentLoop::new(provider, registry.clone(), context, LoopSettings::default()))
        },
        "cover Calc.add",
    )
    .await;

    assert!(outcome.success);
    assert_eq!(outcome.text, "All tests written.");
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.failure_kind, None);

    let log = attempts.lock().unwrap();
    assert_eq!(log.context_ids.len(), 2);
    assert_ne!(log.context_ids[0], log.context_ids[1]);

    // The first attempt saw tool traffic; the retry starts from the seed only.
    assert_eq!(log.providers[0].call_count(), 2);
    let retry_requests = log.providers[1].requests();
    assert_eq!(
        retry_requests[0],
        vec![Turn::system("You write unit tests."), Turn::user("cover Calc.add")]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausting_attempts_reports_transport_failure() {
    let built = Arc::new(Mutex::new(0u32));
    let counter = built.clone();
    let outcome = run_task(
        &fast_policy(3),
        move |_| {
            *counter.lock().unwrap() += 1;
            let provider = Arc::new(MockProvider::new());
            provider.queue_error(AgentError::transport(503, "unavailable"));
            Ok(AgentLoop::with_system_prompt(provider, ToolRegistry::new(), "sys", LoopSettings::default()))
        },
        "hi",
    )
    .await;

    assert!(!outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(*built.lock().unwrap(), 3);
    assert_eq!(outcome.failure_kind, Some(FailureKind::Transport));
    assert!(outcome.detail.unwrap().contains("503"));
}

#[tokio::test(start_paused = true)]
async fn max_iterations_is_not_retried() {
    let workspace = MockWorkspace::new().with_file("a.txt", "alpha");
    let registry = Arc::new(ToolRegistry::new().with_host(workspace));
    let built = Arc::new(Mutex::new(0u32));
    let counter = built.clone();

    let outcome = run_task(
        &fast_policy(5),
        move |_| {
            *counter.lock().unwrap() += 1;
            let provider = Arc::new(MockProvider::repeating(AssistantTurn::new(
                Some("again".into()),
                vec![ToolCall::new("", "read_file", json!({"path": "a.txt"}))],
            )));
            let settings = LoopSettings::builder().max_iterations(3).build();
            Ok(AgentLoop::with_system_prompt(provider, registry.clone(), "sys", settings))
        },
        "loop",
    )
    .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure_kind, Some(FailureKind::MaxIterationsExceeded));
    assert_eq!(outcome.text, "again");
    assert_eq!(outcome.attempts, 1);
    assert_eq!(*built.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_errors_fail_immediately() {
    let outcome = run_task(
        &fast_policy(4),
        |_| {
            let provider = Arc::new(MockProvider::new());
            provider.queue_error(AgentError::transport(401, "invalid api key"));
            Ok(AgentLoop::with_system_prompt(provider, ToolRegistry::new(), "sys", LoopSettings::default()))
        },
        "hi",
    )
    .await;
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.failure_kind, Some(FailureKind::Transport));

    let outcome = run_task(
        &fast_policy(4),
        |_| Err(AgentError::Configuration("no provider".into())),
        "hi",
    )
    .await;
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.failure_kind, Some(FailureKind::Configuration));
}
