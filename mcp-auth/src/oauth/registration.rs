//! RFC 7591: Dynamic Client Registration

use crate::oauth::{
    OAuthState,
    crypto::{generate_token, hash_token},
    error::AuthServerError,
    models::{
        ClientRegistrationRequest, ClientRegistrationResponse, OAuthClient,
        TokenEndpointAuthMethod,
    },
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Duration;
use tracing::{info, instrument, warn};
use url::{Host, Url};

const SUPPORTED_GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];

/// RFC 7591: Dynamic Client Registration
///
/// Endpoint: POST /register
///
/// # Request
/// ```json
/// {
///   "client_name": "Claude",
///   "redirect_uris": ["https://claude.ai/api/mcp/auth_callback"],
///   "grant_types": ["authorization_code", "refresh_token"],
///   "response_types": ["code"],
///   "token_endpoint_auth_method": "client_secret_post"
/// }
/// ```
///
/// # Response (201)
/// ```json
/// {
///   "client_id": "generated_client_id",
///   "client_secret": "generated_client_secret",
///   "client_name": "Claude",
///   "redirect_uris": ["https://claude.ai/api/mcp/auth_callback"],
///   "client_id_issued_at": 1700000000,
///   "client_secret_expires_at": 0,
///   "grant_types": ["authorization_code", "refresh_token"],
///   "response_types": ["code"],
///   "token_endpoint_auth_method": "client_secret_post"
/// }
/// ```
#[instrument(skip_all)]
pub async fn register_client(
    State(state): State<OAuthState>,
    payload: Result<Json<ClientRegistrationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthServerError> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e, "Rejected malformed registration request");
        AuthServerError::InvalidClientMetadata("Malformed client metadata document".to_string())
    })?;

    if request.redirect_uris.is_empty() {
        return Err(AuthServerError::InvalidRedirectUri(
            "At least one redirect_uri is required".to_string(),
        ));
    }

    for uri in &request.redirect_uris {
        if !is_valid_redirect_uri(uri) {
            return Err(AuthServerError::InvalidRedirectUri(format!(
                "Invalid redirect_uri: {uri}. Must be an absolute https URI (http allowed for loopback) without wildcards or fragment"
            )));
        }
    }

    let grant_types = if request.grant_types.is_empty() {
        SUPPORTED_GRANT_TYPES.iter().map(|g| g.to_string()).collect()
    } else {
        request.grant_types.clone()
    };

    if let Some(unsupported) = grant_types
        .iter()
        .find(|g| !SUPPORTED_GRANT_TYPES.contains(&g.as_str()))
    {
        return Err(AuthServerError::InvalidClientMetadata(format!(
            "Unsupported grant_type: {unsupported}. Only authorization_code and refresh_token are supported"
        )));
    }

    if !grant_types.iter().any(|g| g == "authorization_code") {
        return Err(AuthServerError::InvalidClientMetadata(
            "grant_types must include authorization_code".to_string(),
        ));
    }

    let response_types = if request.response_types.is_empty() {
        vec!["code".to_string()]
    } else {
        request.response_types.clone()
    };

    if let Some(unsupported) = response_types.iter().find(|r| r.as_str() != "code") {
        return Err(AuthServerError::InvalidClientMetadata(format!(
            "Unsupported response_type: {unsupported}. Only 'code' is supported"
        )));
    }

    let auth_method = match request.token_endpoint_auth_method.as_deref() {
        None => TokenEndpointAuthMethod::default(),
        Some(method) => TokenEndpointAuthMethod::parse(method).ok_or_else(|| {
            AuthServerError::InvalidClientMetadata(format!(
                "Unsupported token_endpoint_auth_method: {method}"
            ))
        })?,
    };

    if let Some(scope) = request.scope.as_deref() {
        if state.config.resolve_scope(Some(scope)).is_none() {
            return Err(AuthServerError::InvalidClientMetadata(format!(
                "Unsupported scope: {scope}"
            )));
        }
    }

    let now = state.now();
    let client_id = generate_token();
    let client_secret = match auth_method {
        TokenEndpointAuthMethod::ClientSecretPost => Some(generate_token()),
        TokenEndpointAuthMethod::None => None,
    };
    let client_name = request
        .client_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "Unnamed Client".to_string());
    let expires_at = state
        .config
        .client_ttl_secs
        .map(|ttl| now + Duration::seconds(ttl as i64));

    let client = OAuthClient {
        client_id: client_id.clone(),
        client_secret_hash: client_secret.as_deref().map(hash_token),
        client_name: client_name.clone(),
        redirect_uris: request.redirect_uris.clone(),
        grant_types: grant_types.clone(),
        token_endpoint_auth_method: auth_method,
        created_at: now,
        expires_at,
    };

    state.store.save_client(&client, now).await?;

    info!(
        client_id = %client_id,
        client_name = %client_name,
        auth_method = auth_method.as_str(),
        "Registered OAuth client"
    );

    let response = ClientRegistrationResponse {
        client_id,
        client_secret,
        client_name,
        redirect_uris: request.redirect_uris,
        client_id_issued_at: now.timestamp(),
        client_secret_expires_at: expires_at.map(|t| t.timestamp()).unwrap_or(0),
        grant_types,
        response_types,
        token_endpoint_auth_method: auth_method.as_str().to_string(),
    };

    Ok((
        StatusCode::CREATED,
        [(header::CACHE_CONTROL, "no-store")],
        Json(response),
    ))
}

/// Validate a redirect URI at registration time
///
/// Requirements:
/// - absolute URI with an `https` scheme and a host
/// - `http` only for loopback hosts (localhost, 127.0.0.1, [::1])
/// - no fragment, no wildcard
pub fn is_valid_redirect_uri(uri: &str) -> bool {
    if uri.contains('*') || uri.contains('#') {
        return false;
    }

    let Ok(parsed) = Url::parse(uri) else {
        return false;
    };

    match parsed.scheme() {
        "https" => parsed.host().is_some(),
        "http" => match parsed.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        _ => false,
    }
}
