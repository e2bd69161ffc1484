#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Tool registry, dispatcher, and handlers for the Pulse AI assistant.
//!
//! Provides 9 tools that let a language model inspect and operate a fleet
//! of hypervisor nodes, guests, Docker hosts, and Kubernetes clusters. Every
//! mutation passes through the same gates: control level, target
//! resolution, sensitive-path checks, and single-use approval.

pub mod prelude;

mod alerts;
mod capabilities;
mod context;
mod control;
mod docker;
mod error;
mod executor;
mod file_edit;
mod file_ops;
mod gate;
mod guard;
mod kubernetes;
mod output;
mod query;
mod read;
mod remote;
pub mod resolver;
pub mod routing;
mod url_content;

pub use alerts::AlertsTool;
pub use capabilities::CapabilitiesTool;
pub use context::{ExecutorSettings, Provider, Providers, ToolContext};
pub use control::ControlTool;
pub use docker::DockerTool;
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use file_edit::FileEditTool;
pub use kubernetes::KubernetesTool;
pub use output::{render_output, truncate_at_char_boundary, truncate_output};
pub use query::QueryTool;
pub use read::ReadTool;
pub use resolver::{DockerHostType, ResourceLocation, ResourceType, resolve};
pub use routing::{Routing, Transport};
pub use url_content::UrlContentTool;

use pulse_core::{ControlLevel, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// A tool the model can call.
#[async_trait::async_trait]
pub trait PulseTool: Send + Sync {
    /// Tool name as advertised to the model.
    fn name(&self) -> &'static str;

    /// Human-readable description for the model.
    fn description(&self) -> &'static str;

    /// JSON schema for tool input parameters.
    fn input_schema(&self) -> Value;

    /// Whether the tool is hidden and refused at `read_only`.
    fn require_control(&self) -> bool {
        false
    }

    /// Providers that must be configured for the tool to run.
    fn required_providers(&self) -> &'static [Provider] {
        &[]
    }

    /// Why the tool cannot run with `providers`, or `None` if it can.
    fn unavailable_reason(&self, providers: &Providers) -> Option<String> {
        self.required_providers()
            .iter()
            .find(|p| !providers.has(**p))
            .map(|p| format!("{} is not available: {} not configured", self.name(), p.label()))
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Description.
    pub description: String,
    /// JSON schema of the arguments.
    pub input_schema: Value,
    /// Hidden at `read_only`.
    pub require_control: bool,
}

impl ToolDefinition {
    fn of(tool: &dyn PulseTool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
            require_control: tool.require_control(),
        }
    }
}

/// Registry of tools for lookup and schema export.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn PulseTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with every tool registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(QueryTool));
        registry.register(Box::new(CapabilitiesTool));
        registry.register(Box::new(UrlContentTool));
        registry.register(Box::new(AlertsTool));
        registry.register(Box::new(ReadTool));
        registry.register(Box::new(FileEditTool));
        registry.register(Box::new(ControlTool));
        registry.register(Box::new(DockerTool));
        registry.register(Box::new(KubernetesTool));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Box<dyn PulseTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn PulseTool> {
        self.tools.get(name).map(AsRef::as_ref)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Every registered tool, sorted by name.
    #[must_use]
    pub fn all_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition::of(t.as_ref()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Tools the model may see at `level` with `providers` configured,
    /// sorted by name.
    #[must_use]
    pub fn list_tools(&self, level: ControlLevel, providers: &Providers) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| !t.require_control() || level.allows_control_tools())
            .filter(|t| t.unavailable_reason(providers).is_none())
            .map(|t| ToolDefinition::of(t.as_ref()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
