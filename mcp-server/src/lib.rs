//! # BuildGate protocol bridge
//!
//! Exposes automation-server operations as JSON-RPC tools behind an OAuth
//! bearer-token check. The authorization server itself lives in
//! `buildgate-auth`; this crate mounts it next to the bridge.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use buildgate_server::{
//!     BridgeConfig, BridgeHandler, BridgeState, JenkinsAdapter, JenkinsConfig, LocalValidator,
//!     ToolRegistry, build_app,
//! };
//! use buildgate_auth::OAuthState;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let oauth = OAuthState::new_in_memory();
//! let jenkins = JenkinsAdapter::new(JenkinsConfig::new("https://ci.example.com".parse()?))?;
//!
//! let registry = ToolRegistry::builder().adapter(Arc::new(jenkins)).build()?;
//! let config = BridgeConfig::default();
//! let handler = BridgeHandler::new(Arc::new(registry), config.tool_timeout);
//! let validator = Arc::new(LocalValidator::new(oauth.introspector()));
//! let bridge = BridgeState::new(handler, validator, &config)?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, build_app(oauth, bridge)).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod handler;
pub mod jenkins;
pub mod registry;

pub use adapter::{AdapterError, ToolAdapter};
pub use auth::{LocalValidator, RemoteIntrospectionValidator, TokenValidator, ValidationError};
pub use bridge::{BridgeConfig, BridgeError, BridgeState, HealthResponse, bridge_router, health};
pub use config::{Cli, ConfigError, ServerConfig};
pub use handler::{BridgeHandler, DEFAULT_TOOL_TIMEOUT, PLATFORM_TIMEOUT_CEILING};
pub use jenkins::{JenkinsAdapter, JenkinsConfig};
pub use registry::{RegistryError, ToolRegistry, ToolRegistryBuilder};

pub use buildgate_protocol as protocol;

use axum::{Router, routing::get};
use buildgate_auth::{OAuthState, oauth_router};
use tower_http::trace::TraceLayer;

/// The complete HTTP surface: OAuth endpoints, the bridge at `/` and `/health`
pub fn build_app(oauth: OAuthState, bridge: BridgeState) -> Router {
    oauth_router()
        .with_state(oauth)
        .merge(bridge_router(bridge))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}
