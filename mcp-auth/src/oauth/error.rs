//! Endpoint error type
//!
//! Handlers return [`AuthServerError`]; its `IntoResponse` impl is the single
//! place where failures become RFC 6749 error bodies. `InvalidClient` and
//! `InvalidGrant` carry no detail, so a caller cannot tell which check failed.

use crate::oauth::models::OAuthError;
use crate::oauth::storage::StoreError;
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

const INVALID_CLIENT_DESCRIPTION: &str = "Client authentication failed";
const INVALID_GRANT_DESCRIPTION: &str = "The provided authorization grant is invalid, expired, or revoked";

#[derive(Debug, Error)]
pub enum AuthServerError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_redirect_uri: {0}")]
    InvalidRedirectUri(String),

    #[error("invalid_client_metadata: {0}")]
    InvalidClientMetadata(String),

    #[error("invalid_client")]
    InvalidClient,

    #[error("invalid_grant")]
    InvalidGrant,

    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("invalid_scope")]
    InvalidScope,

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl AuthServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Wire body. Storage details are never included.
    pub fn to_oauth_error(&self) -> OAuthError {
        match self {
            Self::InvalidRequest(msg) => OAuthError::invalid_request(msg.clone()),
            Self::InvalidRedirectUri(msg) => OAuthError::invalid_redirect_uri(msg.clone()),
            Self::InvalidClientMetadata(msg) => OAuthError::invalid_client_metadata(msg.clone()),
            Self::InvalidClient => OAuthError::invalid_client(INVALID_CLIENT_DESCRIPTION),
            Self::InvalidGrant => OAuthError::invalid_grant(INVALID_GRANT_DESCRIPTION),
            Self::UnauthorizedClient(msg) => OAuthError::unauthorized_client(msg.clone()),
            Self::UnsupportedGrantType(grant_type) => OAuthError::unsupported_grant_type(
                format!("grant_type '{grant_type}' is not supported"),
            ),
            Self::InvalidScope => OAuthError::invalid_scope("Requested scope is not supported"),
            Self::Store(_) => OAuthError::server_error("Internal server error"),
        }
    }
}

impl IntoResponse for AuthServerError {
    fn into_response(self) -> Response {
        if let Self::Store(ref e) = self {
            error!(error = %e, "Token store operation failed");
        }

        (
            self.status_code(),
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(self.to_oauth_error()),
        )
            .into_response()
    }
}
