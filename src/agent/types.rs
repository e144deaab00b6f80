//! Core run types for the agent loop.

use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::DEFAULT_MAX_TURNS;
use crate::provider::RequestOptions;

/// Unique run identifier.
pub type RunId = Uuid;

pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The model was still requesting tools when the iteration cap was hit.
    MaxIterationsExceeded,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub status: RunStatus,
    /// Text of the last assistant turn.
    pub text: String,
    /// Number of model calls made.
    pub iterations: usize,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn completed(run_id: RunId, text: impl Into<String>, iterations: usize) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            text: text.into(),
            iterations,
            finished_at: Utc::now(),
        }
    }

    pub fn max_iterations(run_id: RunId, text: impl Into<String>, iterations: usize) -> Self {
        Self {
            run_id,
            status: RunStatus::MaxIterationsExceeded,
            text: text.into(),
            iterations,
            finished_at: Utc::now(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Settings for one loop.
///
/// ```
/// use testsmith::agent::LoopSettings;
///
/// let settings = LoopSettings::builder().max_iterations(5).stream(true).build();
/// assert_eq!(settings.max_turns, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct LoopSettings {
    #[builder(default = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,
    #[builder(default = DEFAULT_MAX_TURNS)]
    pub max_turns: usize,
    /// Drive `chat_stream` instead of `chat`.
    #[builder(default)]
    pub stream: bool,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LoopSettings {
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
