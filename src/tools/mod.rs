//! Tool system for function calling.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use registry::{error_text, Capability, Invoker, ToolRegistry};
pub use tool::{AgentTool, ToolHost};
pub use types::{ParamKind, ParamSpec, ReturnKind, ToolDescriptor, ToolMethod, ToolOutput};
