//! HTTP front of the protocol bridge
//!
//! `POST /` runs every request through the same sequence:
//!
//! 1. authenticate the bearer token (401 + `-32000` on failure)
//! 2. parse the JSON-RPC envelope (`-32700` / `-32600`)
//! 3. dispatch through [`BridgeHandler`]
//!
//! The request id is echoed whenever the body can be read, including on the
//! 401 path. Every response from this router, `OPTIONS /` included, carries
//! the same CORS header set.

use crate::auth::{TokenValidator, extract_bearer_token};
use crate::handler::{BridgeHandler, DEFAULT_TOOL_TIMEOUT, PLATFORM_TIMEOUT_CEILING};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, WWW_AUTHENTICATE,
        },
    },
    response::{IntoResponse, Response},
    routing::post,
};
use buildgate_protocol::{Error, JSONRPC_VERSION, Request, Response as RpcResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, error, warn};

const ALLOWED_HEADERS: &str = "Authorization, Content-Type";
const ALLOWED_METHODS: &str = "POST, OPTIONS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Tool timeout must be below {ceiling}s, got {got}s")]
    ToolTimeoutTooLong { got: u64, ceiling: u64 },

    #[error("Tool timeout must be greater than zero")]
    ZeroToolTimeout,

    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Deadline for one tool invocation
    pub tool_timeout: Duration,
    /// Value of `Access-Control-Allow-Origin`
    pub allowed_origin: String,
    /// Advertised in `WWW-Authenticate` on 401 responses (RFC 9728)
    pub resource_metadata_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            allowed_origin: "*".to_string(),
            resource_metadata_url: None,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.tool_timeout.is_zero() {
            return Err(BridgeError::ZeroToolTimeout);
        }
        if self.tool_timeout >= PLATFORM_TIMEOUT_CEILING {
            return Err(BridgeError::ToolTimeoutTooLong {
                got: self.tool_timeout.as_secs(),
                ceiling: PLATFORM_TIMEOUT_CEILING.as_secs(),
            });
        }
        HeaderValue::from_str(&self.allowed_origin)
            .map_err(|_| BridgeError::InvalidHeader("Access-Control-Allow-Origin"))?;
        Ok(())
    }
}

/// Shared state for the bridge endpoint
#[derive(Clone)]
pub struct BridgeState {
    handler: Arc<BridgeHandler>,
    validator: Arc<dyn TokenValidator>,
    cors_origin: HeaderValue,
    www_authenticate: HeaderValue,
}

impl BridgeState {
    pub fn new(
        handler: BridgeHandler,
        validator: Arc<dyn TokenValidator>,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        let cors_origin = HeaderValue::from_str(&config.allowed_origin)
            .map_err(|_| BridgeError::InvalidHeader("Access-Control-Allow-Origin"))?;
        let www_authenticate = match config.resource_metadata_url.as_deref() {
            Some(url) => HeaderValue::from_str(&format!("Bearer resource_metadata=\"{url}\""))
                .map_err(|_| BridgeError::InvalidHeader("WWW-Authenticate"))?,
            None => HeaderValue::from_static("Bearer"),
        };

        Ok(Self {
            handler: Arc::new(handler),
            validator,
            cors_origin,
            www_authenticate,
        })
    }
}

/// Router serving `POST /` and `OPTIONS /`
pub fn bridge_router(state: BridgeState) -> Router {
    let cors_origin = state.cors_origin.clone();

    Router::new()
        .route("/", post(handle_post).options(handle_options))
        .with_state(state)
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            cors_origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
}

/// CORS preflight: no token, no body
async fn handle_options() -> StatusCode {
    StatusCode::OK
}

async fn handle_post(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let parsed = serde_json::from_slice::<Value>(&body);
    let id = parsed
        .as_ref()
        .ok()
        .and_then(|value| value.get("id"))
        .filter(|id| is_valid_id(id))
        .cloned()
        .unwrap_or(Value::Null);

    // AuthCheck
    let Some(token) = extract_bearer_token(&headers) else {
        debug!("Rejected request without a bearer token");
        return unauthorized(&state, id);
    };

    match state.validator.validate(token).await {
        Ok(introspection) if introspection.active => {}
        Ok(_) => {
            debug!("Rejected inactive bearer token");
            return unauthorized(&state, id);
        }
        Err(e) => {
            error!(error = %e, "Token validation failed");
            return rpc_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                RpcResponse::error(id, Error::internal_error("Internal error")),
            );
        }
    }

    // ParseCheck
    let value = match parsed {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Rejected unparseable request body");
            return rpc_ok(RpcResponse::error(
                Value::Null,
                Error::parse_error("Parse error"),
            ));
        }
    };

    let request = match parse_request(value) {
        Ok(request) => request,
        Err(error) => return rpc_ok(RpcResponse::error(id, error)),
    };

    // Dispatch
    match state.handler.handle_request(request).await {
        Some(response) => rpc_ok(response),
        None => (StatusCode::ACCEPTED, [(CONTENT_TYPE, "application/json")]).into_response(),
    }
}

/// Validate the envelope shape before handing it to serde
fn parse_request(value: Value) -> Result<Request, Error> {
    let Some(object) = value.as_object() else {
        return Err(Error::invalid_request(
            "Request must be a JSON object; batches are not supported",
        ));
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(Error::invalid_request("jsonrpc must be \"2.0\""));
    }
    if !object.get("method").is_some_and(Value::is_string) {
        return Err(Error::invalid_request("method must be a string"));
    }
    if object.get("id").is_some_and(|id| !is_valid_id(id)) {
        return Err(Error::invalid_request("id must be a string, number or null"));
    }

    serde_json::from_value(value).map_err(|_| Error::invalid_request("Invalid request"))
}

fn is_valid_id(id: &Value) -> bool {
    id.is_string() || id.is_number() || id.is_null()
}

fn unauthorized(state: &BridgeState, id: Value) -> Response {
    let mut response = rpc_response(
        StatusCode::UNAUTHORIZED,
        RpcResponse::error(id, Error::unauthorized()),
    );
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, state.www_authenticate.clone());
    response
}

fn rpc_ok(response: RpcResponse) -> Response {
    rpc_response(StatusCode::OK, response)
}

fn rpc_response(status: StatusCode, response: RpcResponse) -> Response {
    (status, Json(response)).into_response()
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Liveness probe; no token required
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
