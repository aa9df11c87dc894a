//! Error types for the JSON-RPC tool-calling protocol

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC error object carried in a response's `error` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub struct Error {
    /// Numeric error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error with additional data
    pub fn with_data(code: ErrorCode, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Body was not valid JSON
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, message)
    }

    /// Body was JSON but not a valid JSON-RPC 2.0 request
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Create a method not found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Method not found: {}", method.into()),
        )
    }

    /// Create an invalid params error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Bearer token missing, malformed or no longer active
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "Unauthorized")
    }

    /// Tool name absent from the catalog. Shares the JSON-RPC method-not-found code.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!("Tool not found: {}", tool.into()),
        )
    }

    /// The tool did not answer within the bridge's deadline.
    ///
    /// Timeouts are retryable as a class; `idempotent` tells the caller whether
    /// this particular tool is safe to re-issue without side effects.
    pub fn tool_timeout(tool: &str, idempotent: bool) -> Self {
        Self::with_data(
            ErrorCode::ToolTimeout,
            format!("Tool '{tool}' timed out"),
            serde_json::json!({
                "retryable": true,
                "idempotent": idempotent,
            }),
        )
    }

    /// The tool ran and failed. `message` must already be sanitized.
    pub fn tool_execution_failed(tool: &str, message: impl AsRef<str>) -> Self {
        Self::with_data(
            ErrorCode::ToolExecutionFailed,
            format!("Tool '{tool}' failed: {}", message.as_ref()),
            serde_json::json!({ "retryable": false }),
        )
    }

    /// Whether the client may treat this failure as transient
    pub fn is_retryable(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get("retryable"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// JSON-RPC 2.0 error codes plus the server-defined `-32000` range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Standard JSON-RPC 2.0 errors
    /// Invalid JSON was received
    ParseError = -32700,
    /// The JSON sent is not a valid request object
    InvalidRequest = -32600,
    /// The method (or tool) does not exist
    MethodNotFound = -32601,
    /// Invalid method parameters
    InvalidParams = -32602,
    /// Internal JSON-RPC error
    InternalError = -32603,

    // Server-defined errors
    /// Missing or inactive bearer token
    Unauthorized = -32000,
    /// Tool invocation exceeded its deadline
    ToolTimeout = -32001,
    /// Tool invocation failed permanently
    ToolExecutionFailed = -32002,
}

impl ErrorCode {
    /// Numeric wire value
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map a wire value back to a known code
    pub fn from_i32(code: i32) -> Option<Self> {
        let code = match code {
            -32700 => ErrorCode::ParseError,
            -32600 => ErrorCode::InvalidRequest,
            -32601 => ErrorCode::MethodNotFound,
            -32602 => ErrorCode::InvalidParams,
            -32603 => ErrorCode::InternalError,
            -32000 => ErrorCode::Unauthorized,
            -32001 => ErrorCode::ToolTimeout,
            -32002 => ErrorCode::ToolExecutionFailed,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::ParseError => "ParseError",
            ErrorCode::InvalidRequest => "InvalidRequest",
            ErrorCode::MethodNotFound => "MethodNotFound",
            ErrorCode::InvalidParams => "InvalidParams",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::ToolTimeout => "ToolTimeout",
            ErrorCode::ToolExecutionFailed => "ToolExecutionFailed",
        };
        write!(f, "{name}")
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = i32::deserialize(deserializer)?;
        ErrorCode::from_i32(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error code {code}")))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::parse_error(err.to_string())
    }
}
