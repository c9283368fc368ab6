use std::borrow::Cow;

use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content, ErrorCode};
use serde_json::Value;
use zentickr_core::{NormalizedResult, ToolError};

pub fn mcp_err(
    code: ErrorCode,
    message: impl Into<Cow<'static, str>>,
    data: Option<Value>,
) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data,
    }
}

/// Wraps a normalized result as JSON tool content.
pub fn success(result: NormalizedResult) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::json(result)?]))
}

/// Converts a handler error into an MCP response.
///
/// Argument problems become protocol errors; provider failures become tool
/// results flagged as errors so the client sees the vendor message.
pub fn map_tool_err(err: &ToolError) -> Result<CallToolResult, ErrorData> {
    let payload = err.payload();
    let data = serde_json::to_value(&payload).ok();
    match err {
        ToolError::Provider(_) => Ok(CallToolResult::error(vec![Content::json(payload)?])),
        ToolError::UnknownTool(_) => Err(mcp_err(ErrorCode::METHOD_NOT_FOUND, err.to_string(), data)),
        ToolError::MissingParameter { .. } | ToolError::InvalidParameter { .. } => {
            Err(mcp_err(ErrorCode::INVALID_PARAMS, err.to_string(), data))
        }
    }
}
