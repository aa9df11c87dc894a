//! OAuth 2.1 Token Endpoint
//!
//! Handles token exchange for authorization codes and refresh tokens

use crate::oauth::{
    OAuthState,
    crypto::{constant_time_eq, generate_token, hash_token},
    error::AuthServerError,
    models::{AccessToken, OAuthClient, RefreshToken, TokenRequest, TokenResponse},
    pkce::{S256, validate_code_verifier, verify_pkce},
};
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

/// POST /token - Exchange authorization code or refresh token for access token
///
/// Form-encoded. Supports two grant types:
/// 1. `authorization_code` - with PKCE verification
/// 2. `refresh_token` - rotating the refresh token
///
/// # Authorization Code Grant
/// ```text
/// grant_type=authorization_code&code=...&redirect_uri=...&code_verifier=...
///   &client_id=...&client_secret=...
/// ```
///
/// # Response
/// ```json
/// {
///   "access_token": "opaque_token",
///   "token_type": "Bearer",
///   "expires_in": 3600,
///   "refresh_token": "opaque_refresh_token",
///   "scope": "mcp"
/// }
/// ```
#[instrument(skip_all)]
pub async fn token_endpoint(
    State(state): State<OAuthState>,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Result<Response, AuthServerError> {
    let Form(request) = form
        .map_err(|_| AuthServerError::InvalidRequest("Malformed token request".to_string()))?;

    let grant_type = request
        .grant_type
        .as_deref()
        .ok_or_else(|| AuthServerError::InvalidRequest("grant_type is required".to_string()))?;

    let response = match grant_type {
        "authorization_code" => handle_authorization_code_grant(&state, &request).await?,
        "refresh_token" if state.config.refresh_tokens_enabled => {
            handle_refresh_token_grant(&state, &request).await?
        }
        other => return Err(AuthServerError::UnsupportedGrantType(other.to_string())),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response())
}

/// Authenticate the client making a token request.
///
/// Confidential clients must present their secret, compared in constant
/// time against the stored digest. Every failure maps to the same
/// `invalid_client`.
pub async fn authenticate_client(
    state: &OAuthState,
    client_id: Option<&str>,
    client_secret: Option<&str>,
    now: DateTime<Utc>,
) -> Result<OAuthClient, AuthServerError> {
    let client_id = client_id.ok_or(AuthServerError::InvalidClient)?;
    let client = state
        .store
        .get_client(client_id, now)
        .await?
        .ok_or(AuthServerError::InvalidClient)?;

    if let Some(expected_hash) = client.client_secret_hash.as_deref() {
        let presented = client_secret.ok_or(AuthServerError::InvalidClient)?;
        let presented_hash = hash_token(presented);
        if !constant_time_eq(presented_hash.as_bytes(), expected_hash.as_bytes()) {
            warn!(client_id, "Client secret mismatch");
            return Err(AuthServerError::InvalidClient);
        }
    }

    Ok(client)
}

async fn handle_authorization_code_grant(
    state: &OAuthState,
    request: &TokenRequest,
) -> Result<TokenResponse, AuthServerError> {
    let now = state.now();
    let client = authenticate_client(
        state,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
        now,
    )
    .await?;

    let code = required(request.code.as_deref(), "code")?;
    let redirect_uri = required(request.redirect_uri.as_deref(), "redirect_uri")?;
    let code_verifier = required(request.code_verifier.as_deref(), "code_verifier")?;

    let reject = |reason: &str| {
        warn!(client_id = %client.client_id, reason, "Authorization code exchange rejected");
        AuthServerError::InvalidGrant
    };

    let code_hash = hash_token(code);
    let stored = state
        .store
        .get_code(&code_hash, now)
        .await?
        .ok_or_else(|| reject("unknown or expired code"))?;

    if stored.consumed {
        return Err(reject("code already used"));
    }
    if stored.client_id != client.client_id {
        return Err(reject("code issued to another client"));
    }
    if stored.redirect_uri != redirect_uri {
        return Err(reject("redirect_uri mismatch"));
    }
    if stored.code_challenge_method != S256
        || !validate_code_verifier(code_verifier)
        || !verify_pkce(code_verifier, &stored.code_challenge)
    {
        return Err(reject("PKCE verification failed"));
    }

    // Only the request that flips `consumed` gets tokens
    let consumed = state
        .store
        .consume_code(&code_hash, now)
        .await?
        .ok_or_else(|| reject("code already used"))?;

    let response = issue_tokens(state, &client.client_id, &consumed.scope, now).await?;
    info!(client_id = %client.client_id, "Exchanged authorization code for tokens");
    Ok(response)
}

async fn handle_refresh_token_grant(
    state: &OAuthState,
    request: &TokenRequest,
) -> Result<TokenResponse, AuthServerError> {
    let now = state.now();
    let client = authenticate_client(
        state,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
        now,
    )
    .await?;

    if !client.allows_grant("refresh_token") {
        return Err(AuthServerError::UnauthorizedClient(
            "Client is not allowed to use the refresh_token grant".to_string(),
        ));
    }

    let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;
    let token_hash = hash_token(refresh_token);

    let reject = |reason: &str| {
        warn!(client_id = %client.client_id, reason, "Refresh token grant rejected");
        AuthServerError::InvalidGrant
    };

    let stored = state
        .store
        .get_refresh_token(&token_hash, now)
        .await?
        .ok_or_else(|| reject("unknown or expired refresh token"))?;

    if stored.client_id != client.client_id {
        return Err(reject("refresh token issued to another client"));
    }

    // Rotation: the old token is gone before the new one exists
    let taken = state
        .store
        .take_refresh_token(&token_hash, now)
        .await?
        .ok_or_else(|| reject("refresh token already used"))?;

    let response = issue_tokens(state, &client.client_id, &taken.scope, now).await?;
    info!(client_id = %client.client_id, "Rotated refresh token");
    Ok(response)
}

/// Mint an access token (and a linked refresh token when enabled)
async fn issue_tokens(
    state: &OAuthState,
    client_id: &str,
    scope: &str,
    now: DateTime<Utc>,
) -> Result<TokenResponse, AuthServerError> {
    let access_token = generate_token();
    let access_hash = hash_token(&access_token);
    let access_ttl = state.config.access_token_ttl_secs as i64;

    state
        .store
        .save_access_token(
            &AccessToken {
                token_hash: access_hash.clone(),
                client_id: client_id.to_string(),
                scope: scope.to_string(),
                issued_at: now,
                expires_at: now + Duration::seconds(access_ttl),
            },
            now,
        )
        .await?;

    let refresh_token = if state.config.refresh_tokens_enabled {
        let refresh_token = generate_token();
        state
            .store
            .save_refresh_token(
                &RefreshToken {
                    token_hash: hash_token(&refresh_token),
                    client_id: client_id.to_string(),
                    scope: scope.to_string(),
                    issued_at: now,
                    expires_at: now
                        + Duration::seconds(state.config.refresh_token_ttl_secs as i64),
                    access_token_hashes: vec![access_hash],
                },
                now,
            )
            .await?;
        Some(refresh_token)
    } else {
        None
    };

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: access_ttl,
        refresh_token,
        scope: scope.to_string(),
    })
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, AuthServerError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthServerError::InvalidRequest(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_and_empty() {
        assert_eq!(required(Some("abc"), "code").unwrap(), "abc");
        assert!(matches!(
            required(None, "code"),
            Err(AuthServerError::InvalidRequest(msg)) if msg == "code is required"
        ));
        assert!(required(Some(""), "code").is_err());
    }

    #[tokio::test]
    async fn test_issue_tokens_links_refresh_to_access() {
        let state = OAuthState::new_in_memory();
        let now = state.now();

        let response = issue_tokens(&state, "client", "mcp", now).await.unwrap();
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_ne!(Some(&response.access_token), response.refresh_token.as_ref());

        let refresh_hash = hash_token(response.refresh_token.as_deref().unwrap());
        let refresh = state
            .store
            .get_refresh_token(&refresh_hash, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            refresh.access_token_hashes,
            vec![hash_token(&response.access_token)]
        );
    }

    #[tokio::test]
    async fn test_issue_tokens_without_refresh() {
        let mut config = crate::config::AuthServerConfig::default();
        config.refresh_tokens_enabled = false;
        let state = OAuthState::new(
            std::sync::Arc::new(crate::oauth::storage::MemoryTokenStore::new()),
            config,
        );

        let response = issue_tokens(&state, "client", "mcp", state.now()).await.unwrap();
        assert!(response.refresh_token.is_none());
    }
}
