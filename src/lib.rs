//! testsmith: a tool-calling agent runtime for LLM-driven test generation.
//!
//! A run sends a bounded conversation to a chat model, dispatches the tools it
//! requests through a policy-checked registry, feeds the results back, and
//! repeats until the model answers without tool calls or an iteration cap is
//! reached. OpenAI, Anthropic and Google wire protocols are supported.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use testsmith::prelude::*;
//!
//! # async fn example() -> testsmith::error::Result<()> {
//! let config = AgentConfig::from_env();
//! let model: ModelSpec = "openai:gpt-4o".parse()?;
//! let provider: Arc<dyn ChatProvider> = create_provider(&model, &config)?.into();
//!
//! let registry = ToolRegistry::new().with_host(Arc::new(AgentTool::new(
//!     ToolMethod::new("echo", "Echo the input").text("text", "Text to echo"),
//!     |args: ToolArguments| async move { Ok(ToolOutput::from(args.get_str("text")?)) },
//! )));
//!
//! let mut agent = AgentLoop::with_system_prompt(provider, registry, "You write unit tests.", LoopSettings::default());
//! let result = agent.run("Write a test for add(a, b).").await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod governance;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;
