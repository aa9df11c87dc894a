//! RFC 7009: Token Revocation

use crate::oauth::{
    OAuthState, crypto::hash_token, error::AuthServerError, models::RevocationRequest,
};
use axum::{
    Form,
    extract::{State, rejection::FormRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, instrument};

/// POST /revoke
///
/// Form body `token=<access or refresh token>` with an optional
/// `token_type_hint`. The hint only decides which kind is looked up first.
/// Revoking a refresh token also revokes the access tokens issued with it.
///
/// Answers 200 whether or not the token existed.
#[instrument(skip_all)]
pub async fn revoke_endpoint(
    State(state): State<OAuthState>,
    form: Result<Form<RevocationRequest>, FormRejection>,
) -> Result<impl IntoResponse, AuthServerError> {
    let Form(request) = form
        .map_err(|_| AuthServerError::InvalidRequest("Malformed revocation request".to_string()))?;

    let token = request
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthServerError::InvalidRequest("token is required".to_string()))?;
    let token_hash = hash_token(&token);

    let refresh_first = request.token_type_hint.as_deref() == Some("refresh_token");
    let revoked = if refresh_first {
        revoke_refresh(&state, &token_hash).await? || revoke_access(&state, &token_hash).await?
    } else {
        revoke_access(&state, &token_hash).await? || revoke_refresh(&state, &token_hash).await?
    };

    if revoked {
        info!("Revoked token");
    }

    Ok((StatusCode::OK, [(header::CACHE_CONTROL, "no-store")]))
}

async fn revoke_access(state: &OAuthState, token_hash: &str) -> Result<bool, AuthServerError> {
    Ok(state.store.revoke_access_token(token_hash).await?)
}

async fn revoke_refresh(state: &OAuthState, token_hash: &str) -> Result<bool, AuthServerError> {
    Ok(state.store.revoke_refresh_token(token_hash).await?.is_some())
}
