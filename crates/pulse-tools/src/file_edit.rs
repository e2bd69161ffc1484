//! File edit tool: read, write, or append files on fleet targets.

use pulse_core::{ToolResult, args};
use serde_json::{Value, json};

use crate::PulseTool;
use crate::context::{Provider, ToolContext};
use crate::error::ToolError;
use crate::file_ops::{self, WriteMode};

const ACTIONS: &[&str] = &["read", "append", "write"];

/// Built-in tool for editing remote files.
pub struct FileEditTool;

#[async_trait::async_trait]
impl PulseTool for FileEditTool {
    fn name(&self) -> &'static str {
        "pulse_file_edit"
    }

    fn description(&self) -> &'static str {
        "Reads, writes, or appends files on a node, guest, Docker container, or host. Content \
         is transferred base64-encoded and verified by sha256 after writing. Writes need \
         approval in controlled mode. Name the guest, not its node, when writing inside a \
         system container or VM."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "File operation"
                },
                "path": {
                    "type": "string",
                    "description": "Absolute file path"
                },
                "content": {
                    "type": "string",
                    "description": "For write/append: the content"
                },
                "target_host": {
                    "type": "string",
                    "description": "Node, guest, Docker container, or host name"
                },
                "docker_container": {
                    "type": "string",
                    "description": "Operate inside this Docker container on target_host"
                },
                "pre_approved_id": {
                    "type": "string",
                    "description": "Approval id returned by an earlier APPROVAL_REQUIRED response"
                }
            },
            "required": ["action", "path", "target_host"]
        })
    }

    fn require_control(&self) -> bool {
        true
    }

    fn required_providers(&self) -> &'static [Provider] {
        &[Provider::Transport]
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        edit(&args, ctx).await.unwrap_or_else(Into::into)
    }
}

async fn edit(call_args: &Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
    match args::require_enum(call_args, "action", ACTIONS)?.as_str() {
        "read" => file_ops::read_file(ctx, call_args).await,
        "append" => file_ops::write_file(ctx, call_args, WriteMode::Append).await,
        _ => file_ops::write_file(ctx, call_args, WriteMode::Write).await,
    }
}
