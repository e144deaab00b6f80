//! Utility modules: retry.

pub mod retry;

pub use retry::{run_task, RetryPolicy, TaskOutcome};
