//! RFC 7662: Token Introspection
//!
//! [`Introspector`] is the one place that decides whether an access token is
//! live. The HTTP endpoint and the bridge's in-process validator both go
//! through it.

use crate::oauth::{
    OAuthState,
    clock::Clock,
    crypto::hash_token,
    error::AuthServerError,
    models::{IntrospectionRequest, IntrospectionResponse},
    storage::{StoreError, TokenStore},
};
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Answers "is this bearer token currently valid?"
#[derive(Clone)]
pub struct Introspector {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
}

impl Introspector {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Unknown, expired and revoked tokens all come back as
    /// [`IntrospectionResponse::inactive`].
    pub async fn introspect(&self, token: &str) -> Result<IntrospectionResponse, StoreError> {
        if token.is_empty() {
            return Ok(IntrospectionResponse::inactive());
        }

        let now = self.clock.now();
        match self.store.get_access_token(&hash_token(token), now).await? {
            Some(access_token) => Ok(IntrospectionResponse::active(&access_token)),
            None => {
                debug!("Introspected inactive token");
                Ok(IntrospectionResponse::inactive())
            }
        }
    }
}

/// POST /introspect
///
/// Form body `token=<access token>`; `token_type_hint` is accepted and
/// ignored since only access tokens are introspectable.
#[instrument(skip_all)]
pub async fn introspect_endpoint(
    State(state): State<OAuthState>,
    form: Result<Form<IntrospectionRequest>, FormRejection>,
) -> Result<impl IntoResponse, AuthServerError> {
    let Form(request) = form.map_err(|_| {
        AuthServerError::InvalidRequest("Malformed introspection request".to_string())
    })?;

    let token = request
        .token
        .ok_or_else(|| AuthServerError::InvalidRequest("token is required".to_string()))?;

    let response = state.introspector().introspect(&token).await?;

    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    ))
}
