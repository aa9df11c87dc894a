//! JSON-RPC request dispatch
//!
//! Takes an authenticated, well-formed [`Request`] and produces the
//! [`Response`] to send back. Transport concerns (HTTP status, headers,
//! authentication) live in [`bridge`](crate::bridge).

use crate::adapter::AdapterError;
use crate::registry::ToolRegistry;
use buildgate_logging::get_sanitizer;
use buildgate_protocol::{
    CallToolRequestParam, CallToolResult, Error, Implementation, InitializeResult,
    ListToolsResult, Request, Response, ServerCapabilities, ToolsCapability,
    negotiate_protocol_version,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Default deadline for a single tool invocation
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(25);

/// Upper bound the hosting platform places on a whole request
pub const PLATFORM_TIMEOUT_CEILING: Duration = Duration::from_secs(29);

/// Routes JSON-RPC methods to the tool registry
#[derive(Debug, Clone)]
pub struct BridgeHandler {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
    server_info: Implementation,
    instructions: Option<String>,
}

impl BridgeHandler {
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            registry,
            tool_timeout,
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: None,
        }
    }

    pub fn with_server_info(mut self, server_info: Implementation) -> Self {
        self.server_info = server_info;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_timeout(&self) -> Duration {
        self.tool_timeout
    }

    /// Handle one request. Notifications are acknowledged without dispatch
    /// and yield `None`.
    #[instrument(skip_all, fields(method = %request.method))]
    pub async fn handle_request(&self, request: Request) -> Option<Response> {
        let Some(id) = request.id.clone() else {
            debug!("Received notification");
            return None;
        };

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            other => Err(Error::method_not_found(other)),
        };

        Some(match result {
            Ok(value) => Response::success(id, value),
            Err(error) => {
                debug!(code = %error.code, "Request failed");
                Response::error(id, error)
            }
        })
    }

    fn handle_initialize(&self, params: &Value) -> Result<Value, Error> {
        let requested = params.get("protocolVersion").and_then(Value::as_str);

        let result = InitializeResult {
            protocol_version: negotiate_protocol_version(requested).to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };

        to_value(result)
    }

    fn handle_list_tools(&self) -> Result<Value, Error> {
        to_value(ListToolsResult {
            tools: self.registry.tools().to_vec(),
            next_cursor: None,
        })
    }

    async fn handle_call_tool(&self, params: Value) -> Result<Value, Error> {
        let params: CallToolRequestParam = serde_json::from_value(params)
            .map_err(|_| Error::invalid_params("tools/call requires a string 'name' parameter"))?;

        let entry = self
            .registry
            .get(&params.name)
            .ok_or_else(|| Error::tool_not_found(&params.name))?;

        entry.schema.validate(params.arguments.as_ref())?;

        let name = params.name.as_str();
        let arguments = params
            .arguments
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.tool_timeout, entry.adapter.execute(name, arguments)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                info!(tool = name, elapsed_ms, "Tool call succeeded");
                to_value(CallToolResult::structured(value))
            }
            Ok(Err(AdapterError::InvalidArguments(message))) => {
                let message = get_sanitizer().sanitize(&message);
                warn!(tool = name, elapsed_ms, error = %message, "Tool rejected arguments");
                Err(Error::invalid_params(format!("Invalid arguments: {message}")))
            }
            Ok(Err(e)) => {
                let message = get_sanitizer().sanitize_error(&e);
                error!(tool = name, elapsed_ms, error = %message, "Tool call failed");
                Err(Error::tool_execution_failed(name, message))
            }
            Err(_) => {
                let idempotent = entry.definition.is_idempotent();
                error!(
                    tool = name,
                    timeout_ms = self.tool_timeout.as_millis() as u64,
                    idempotent,
                    "Tool call timed out"
                );
                Err(Error::tool_timeout(name, idempotent))
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| {
        error!(error = %e, "Failed to serialize result");
        Error::internal_error("Internal error")
    })
}
