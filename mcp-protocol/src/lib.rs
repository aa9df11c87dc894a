//! JSON-RPC 2.0 and MCP tool-calling types for BuildGate
//!
//! This crate holds the wire types shared by the protocol bridge: request and
//! response envelopes, the error code taxonomy, tool definitions, and the
//! JSON-schema validation used to check tool arguments before dispatch.
//!
//! # Quick Start
//!
//! ```rust
//! use buildgate_protocol::{ArgumentSchema, Response, Tool};
//! use serde_json::json;
//!
//! let tool = Tool {
//!     name: "get_job_status".to_string(),
//!     description: "Report the last build of a job".to_string(),
//!     input_schema: json!({
//!         "type": "object",
//!         "properties": {"job": {"type": "string"}},
//!         "required": ["job"]
//!     }),
//!     annotations: None,
//! };
//!
//! let schema = ArgumentSchema::compile(&tool.input_schema).unwrap();
//! let err = schema.validate(Some(&json!({}))).unwrap_err();
//! let response = Response::error(json!(7), err);
//! assert!(response.result.is_none());
//! ```

pub mod error;
pub mod model;
pub mod validation;

#[cfg(test)]
mod model_tests;

pub use error::{Error, ErrorCode, Result};
pub use model::*;
pub use validation::{ArgumentSchema, Validator};

/// Protocol version spoken by this server
pub const MCP_VERSION: &str = "2025-06-18";

/// Protocol versions accepted during `initialize`
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Check if a protocol version is supported
pub fn is_protocol_version_supported(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// Pick the version to answer `initialize` with: the client's if supported,
/// otherwise the latest this server speaks.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(MCP_VERSION)
}
