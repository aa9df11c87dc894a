//! Adapter trait for the downstream automation system

use async_trait::async_trait;
use buildgate_protocol::Tool;
use serde_json::Value;
use thiserror::Error;

/// Error type for adapter operations
///
/// Messages may carry upstream detail (URLs, response bodies); the bridge
/// sanitizes them before they are logged or returned.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// A source of tools the bridge can dispatch to
///
/// `tools` is read once when the [`ToolRegistry`](crate::registry::ToolRegistry)
/// is built; `execute` is only ever called with a name from that list and
/// arguments that already passed the tool's input schema.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Static catalog of the tools this adapter serves
    fn tools(&self) -> Vec<Tool>;

    /// Run `name` with validated `arguments`
    async fn execute(&self, name: &str, arguments: Value) -> Result<Value, AdapterError>;
}
