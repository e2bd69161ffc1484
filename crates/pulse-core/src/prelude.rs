//! Prelude module - commonly used types for convenient import.
//!
//! Use `use pulse_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult, TransportError};

// Policy
pub use crate::ControlLevel;

// Results
pub use crate::{Blocked, BlockedCode, BlockedDetails, ToolResult};

// Providers
pub use crate::{
    AgentTransport, AlertProvider, CommandOutput, CommandRequest, ConnectedAgent, QueuedCommand,
    StateProvider, TargetType, UpdateProvider,
};

// Inventory
pub use crate::{
    ContainerUpdate, DockerContainer, DockerHost, Guest, GuestKind, Host, KubernetesCluster, Node,
    StateSnapshot,
};

// Shell helpers
pub use crate::{
    is_valid_container_name, shell_escape, validate_container_name, validate_dns_name,
    wrap_docker_exec,
};
