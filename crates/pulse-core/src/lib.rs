//! Pulse Core - Foundation types and traits for the Pulse AI tool dispatch core.
//!
//! This crate provides:
//! - The [`ControlLevel`] policy ladder
//! - The [`ToolResult`] envelope and structured [`Blocked`] errors
//! - The fleet inventory model ([`StateSnapshot`] and friends)
//! - Narrow provider traits for state, agent transport, and alerts
//! - Shell escaping, identifier checks, and argument coercion helpers
//!   shared by every tool

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod args;
pub mod control;
pub mod env;
pub mod error;
pub mod ident;
pub mod provider;
pub mod result;
pub mod shell;
pub mod state;

pub use control::ControlLevel;
pub use error::{CoreError, CoreResult, TransportError};
pub use ident::{is_valid_container_name, validate_container_name, validate_dns_name};
pub use provider::{
    AgentTransport, AlertProvider, CommandOutput, CommandRequest, ConnectedAgent, QueuedCommand,
    StateProvider, TargetType, UpdateProvider,
};
pub use result::{Blocked, BlockedCode, BlockedDetails, ToolResult};
pub use shell::{shell_escape, wrap_docker_exec};
pub use state::{
    ActiveAlert, ContainerUpdate, DockerContainer, DockerHost, Guest, GuestKind, Host,
    KubernetesCluster, KubernetesDeployment, KubernetesPod, Node, ResolvedAlert, StateSnapshot,
};
