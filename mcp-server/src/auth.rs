//! Bearer token validation for the bridge
//!
//! The bridge never decides token validity itself. It asks a
//! [`TokenValidator`], which either calls the authorization server's
//! introspection function in-process or POSTs to a remote `/introspect`.

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use buildgate_auth::{IntrospectionResponse, Introspector, StoreError};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure to reach a verdict (as opposed to an inactive token)
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),

    #[error("Introspection request failed: {0}")]
    Remote(String),
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Introspect `token`. `Ok` with `active == false` means "not valid".
    async fn validate(&self, token: &str) -> Result<IntrospectionResponse, ValidationError>;
}

/// Validates against the shared token store in-process
#[derive(Clone)]
pub struct LocalValidator {
    introspector: Introspector,
}

impl LocalValidator {
    pub fn new(introspector: Introspector) -> Self {
        Self { introspector }
    }
}

#[async_trait]
impl TokenValidator for LocalValidator {
    async fn validate(&self, token: &str) -> Result<IntrospectionResponse, ValidationError> {
        Ok(self.introspector.introspect(token).await?)
    }
}

/// Validates by calling a remote RFC 7662 endpoint
#[derive(Debug, Clone)]
pub struct RemoteIntrospectionValidator {
    client: reqwest::Client,
    endpoint: Url,
}

impl RemoteIntrospectionValidator {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl TokenValidator for RemoteIntrospectionValidator {
    async fn validate(&self, token: &str) -> Result<IntrospectionResponse, ValidationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| ValidationError::Remote(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ValidationError::Remote(format!(
                "introspection endpoint returned {}",
                response.status()
            )));
        }

        let introspection = response
            .json::<IntrospectionResponse>()
            .await
            .map_err(|e| ValidationError::Remote(e.to_string()))?;

        debug!(active = introspection.active, "Remote introspection completed");
        Ok(introspection)
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; anything else is `None`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        None
    } else {
        Some(token)
    }
}
