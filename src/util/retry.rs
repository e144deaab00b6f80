//! Retry with exponential backoff, and the whole-run retry wrapper.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::{AgentLoop, RunStatus};
use crate::error::{AgentError, FailureKind};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff after the failed attempt numbered `attempt` (0-based):
    /// `initial * multiplier^attempt`, capped at `max_backoff`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_backoff.as_secs_f64();
        if secs.is_finite() && secs < max {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.max_backoff
        }
    }

    /// Backoff for `error`. A server-provided retry-after replaces the computed delay, capped at `max_backoff`.
    fn delay_after(&self, error: &AgentError, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        match error {
            AgentError::Transport {
                retry_after_ms: Some(ms),
                ..
            } => Duration::from_millis(*ms).min(self.max_backoff),
            _ => base,
        }
    }

    /// Execute an async operation with retry.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 >= max_attempts {
                        return Err(e);
                    }
                    let delay = self.delay_after(&e, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Structured result of [`run_task`] for the driving process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    /// Final (or last) assistant text; empty when no attempt got that far.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub attempts: u32,
}

impl TaskOutcome {
    fn success(text: String, attempts: u32) -> Self {
        Self {
            success: true,
            text,
            failure_kind: None,
            detail: None,
            attempts,
        }
    }

    fn failure(kind: FailureKind, text: String, detail: String, attempts: u32) -> Self {
        Self {
            success: false,
            text,
            failure_kind: Some(kind),
            detail: Some(detail),
            attempts,
        }
    }
}

/// Run `user_text` through a fresh [`AgentLoop`] per attempt.
///
/// `factory(attempt)` must build a new loop (new conversation, new provider
/// binding) every time; nothing from a failed attempt reaches the next one.
/// Only retryable errors trigger another attempt. Hitting the iteration cap
/// is final.
pub async fn run_task<F>(policy: &RetryPolicy, mut factory: F, user_text: &str) -> TaskOutcome
where
    F: FnMut(u32) -> Result<AgentLoop, AgentError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let attempts = attempt + 1;
        let result = match factory(attempt) {
            Ok(mut agent) => agent.run(user_text).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(run) if run.status == RunStatus::Completed => {
                info!(attempts, iterations = run.iterations, "task succeeded");
                return TaskOutcome::success(run.text, attempts);
            }
            Ok(run) => {
                warn!(attempts, iterations = run.iterations, "task stopped at the iteration cap");
                return TaskOutcome::failure(
                    FailureKind::MaxIterationsExceeded,
                    run.text,
                    format!("exceeded {} iterations", run.iterations),
                    attempts,
                );
            }
            Err(e) if e.is_retryable() && attempts < max_attempts => {
                let delay = policy.delay_after(&e, attempt);
                warn!(
                    attempt = attempts,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "task attempt failed, retrying with a fresh agent"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(attempts, error = %e, "task failed");
                return TaskOutcome::failure(e.failure_kind(), String::new(), e.to_string(), attempts);
            }
        }
    }
}
