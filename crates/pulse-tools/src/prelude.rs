//! Prelude module - commonly used types for convenient import.
//!
//! Use `use pulse_tools::prelude::*;` to wire an executor and call tools.

// Dispatch
pub use crate::{PulseTool, ToolDefinition, ToolExecutor, ToolRegistry};

// Context
pub use crate::{ExecutorSettings, Provider, Providers, ToolContext, ToolError};

// Resolution
pub use crate::{ResourceLocation, ResourceType, Routing, Transport, resolve};

// Results
pub use pulse_core::{BlockedCode, ControlLevel, ToolResult};
