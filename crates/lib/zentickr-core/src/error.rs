use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised while building or querying the tool catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("tool already registered: {0}")]
    DuplicateTool(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Failure reported by a data provider.
///
/// Network faults, unknown symbols, vendor rate limits and malformed vendor
/// responses all collapse into this one kind, keeping the original message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    message: String,
    timed_out: bool,
}

impl ProviderError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self {
            message: format!("provider call timed out after {}ms", after.as_millis()),
            timed_out: true,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced to callers of [`crate::RequestHandler::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("missing required parameter `{parameter}` for tool {tool}")]
    MissingParameter { tool: String, parameter: String },
    #[error("invalid value for `{parameter}`: {reason}")]
    InvalidParameter { parameter: String, reason: String },
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ToolError {
    pub(crate) fn invalid(parameter: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable identifier for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::MissingParameter { .. } => "missing_parameter",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::Provider(_) => "provider_error",
        }
    }

    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable error object returned to MCP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_kind_and_message() {
        let err = ToolError::MissingParameter {
            tool: "get_earnings".to_string(),
            parameter: "symbols".to_string(),
        };
        let payload = err.payload();
        assert_eq!(payload.kind, "missing_parameter");
        assert!(payload.message.contains("symbols"));
    }

    #[test]
    fn timeout_is_flagged() {
        let err = ProviderError::timeout(Duration::from_millis(250));
        assert!(err.timed_out());
        assert!(err.message().contains("timed out"));
        assert!(!ProviderError::new("boom").timed_out());
    }
}
