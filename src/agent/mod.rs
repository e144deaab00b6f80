//! Agent system: bounded conversations and the tool-calling loop.

pub mod conversation;
pub mod runner;
pub mod types;

pub use conversation::ContextManager;
pub use runner::{AgentLoop, TokenSink};
pub use types::{LoopSettings, RunId, RunResult, RunStatus};
