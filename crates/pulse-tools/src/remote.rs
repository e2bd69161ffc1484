//! Cancellable, bounded remote execution through the agent transport.

use std::time::Duration;

use pulse_core::{CommandOutput, CommandRequest, TransportError};
use tracing::debug;

use crate::context::ToolContext;
use crate::error::ToolError;

/// Run `request` on `agent_id`, giving up after `timeout` or when the
/// invocation is cancelled.
pub(crate) async fn run(
    ctx: &ToolContext,
    agent_id: &str,
    request: CommandRequest,
    timeout: Duration,
) -> Result<CommandOutput, ToolError> {
    let transport = ctx.require_transport()?;
    let request = request.normalized()?;

    debug!(
        agent_id,
        target_type = ?request.target_type,
        target_id = %request.target_id,
        timeout_secs = timeout.as_secs(),
        "Dispatching command to agent"
    );

    let outcome = tokio::select! {
        () = ctx.cancel.cancelled() => Err(TransportError::Cancelled),
        res = tokio::time::timeout(timeout, transport.execute_command(agent_id, request)) => {
            res.unwrap_or(Err(TransportError::Timeout(timeout.as_secs())))
        }
    };

    match outcome {
        Ok(output) => {
            debug!(agent_id, exit_code = output.exit_code, "Agent command finished");
            Ok(output)
        },
        Err(e) => Err(ToolError::transport(format!("command on {agent_id} failed"), e)),
    }
}
