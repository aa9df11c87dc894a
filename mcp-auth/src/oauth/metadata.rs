//! Discovery documents
//!
//! - RFC 8414: Authorization Server Metadata
//! - RFC 9728: Protected Resource Metadata
//!
//! Both are derived from [`AuthServerConfig`] alone and carry a public cache
//! header.

use crate::config::AuthServerConfig;
use crate::oauth::OAuthState;
use axum::{Json, extract::State, http::header, response::IntoResponse};
use serde::{Deserialize, Serialize};

const CACHE_CONTROL_PUBLIC: &str = "public, max-age=3600";

/// RFC 8414 metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub introspection_endpoint: String,
    pub revocation_endpoint: String,
    pub grant_types_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    pub fn from_config(config: &AuthServerConfig) -> Self {
        let mut grant_types = vec!["authorization_code".to_string()];
        if config.refresh_tokens_enabled {
            grant_types.push("refresh_token".to_string());
        }

        Self {
            issuer: config.base_url().to_string(),
            authorization_endpoint: config.endpoint("/authorize"),
            token_endpoint: config.endpoint("/token"),
            registration_endpoint: config.endpoint("/register"),
            introspection_endpoint: config.endpoint("/introspect"),
            revocation_endpoint: config.endpoint("/revoke"),
            grant_types_supported: grant_types,
            response_types_supported: vec!["code".to_string()],
            code_challenge_methods_supported: vec!["S256".to_string()],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_post".to_string(),
                "none".to_string(),
            ],
            scopes_supported: config.scopes_supported.clone(),
        }
    }
}

/// RFC 9728 metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn from_config(config: &AuthServerConfig) -> Self {
        Self {
            resource: config.base_url().to_string(),
            authorization_servers: vec![config.base_url().to_string()],
            bearer_methods_supported: vec!["header".to_string()],
            scopes_supported: config.scopes_supported.clone(),
        }
    }
}

/// GET /.well-known/oauth-authorization-server
pub async fn authorization_server_metadata(State(state): State<OAuthState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, CACHE_CONTROL_PUBLIC)],
        Json(AuthorizationServerMetadata::from_config(&state.config)),
    )
}

/// GET /.well-known/oauth-protected-resource
pub async fn protected_resource_metadata(State(state): State<OAuthState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, CACHE_CONTROL_PUBLIC)],
        Json(ProtectedResourceMetadata::from_config(&state.config)),
    )
}
