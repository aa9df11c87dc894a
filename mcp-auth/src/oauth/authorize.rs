//! OAuth 2.1 Authorization Endpoint with PKCE
//!
//! Machine-to-machine flow: there is no consent page. A request from a
//! registered client with a registered redirect_uri and a valid S256
//! challenge is answered with a 302 carrying a fresh authorization code.
//!
//! Until the client and redirect_uri are verified, errors are answered with
//! a 400 JSON body and never redirect. After that point errors travel back to
//! the client on the redirect (RFC 6749 Section 4.1.2.1).

use crate::oauth::{
    OAuthState,
    crypto::{generate_token, hash_token},
    models::{AuthorizationCode, AuthorizeRequest, OAuthError},
    pkce::{S256, validate_code_challenge},
};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

/// GET /authorize
///
/// # Query Parameters
/// - `response_type`: Must be "code"
/// - `client_id`: Registered client identifier
/// - `redirect_uri`: Must exactly match one of the client's registered URIs
/// - `state`: Opaque value echoed back on the redirect
/// - `code_challenge`: PKCE S256 code challenge
/// - `code_challenge_method`: Must be "S256"
/// - `scope`: (Optional) Space-separated scopes
///
/// # Example
/// ```text
/// GET /authorize?
///   response_type=code&
///   client_id=abc123&
///   redirect_uri=https://example.com/callback&
///   state=xyz&
///   code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM&
///   code_challenge_method=S256
/// ```
#[instrument(skip_all)]
pub async fn authorize(
    State(state): State<OAuthState>,
    query: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Response {
    let Ok(Query(params)) = query else {
        return bad_request(OAuthError::invalid_request("Malformed authorization request"));
    };

    let Some(client_id) = params.client_id.as_deref() else {
        return bad_request(OAuthError::invalid_request("client_id is required"));
    };
    let Some(redirect_uri) = params.redirect_uri.as_deref() else {
        return bad_request(OAuthError::invalid_request("redirect_uri is required"));
    };

    let now = state.now();
    let client = match state.store.get_client(client_id, now).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            warn!(client_id, "Authorization request for unknown client");
            return bad_request(OAuthError::invalid_client("Unknown client or redirect_uri"));
        }
        Err(e) => {
            error!(error = %e, "Token store operation failed");
            return server_error();
        }
    };

    if !client.has_redirect_uri(redirect_uri) {
        warn!(client_id, "Authorization request with unregistered redirect_uri");
        return bad_request(OAuthError::invalid_client("Unknown client or redirect_uri"));
    }

    // The redirect target is now trusted.
    let client_state = params.state.as_deref();
    let redirect_error =
        |error: OAuthError| error_redirect(redirect_uri, &error, client_state);

    match params.response_type.as_deref() {
        Some("code") => {}
        Some(other) => {
            return redirect_error(OAuthError::unsupported_response_type(format!(
                "response_type '{other}' is not supported"
            )));
        }
        None => return redirect_error(OAuthError::invalid_request("response_type is required")),
    }

    if !client.allows_grant("authorization_code") {
        return redirect_error(OAuthError::unauthorized_client(
            "Client is not allowed to use the authorization_code grant",
        ));
    }

    let Some(code_challenge) = params.code_challenge.as_deref() else {
        return redirect_error(OAuthError::invalid_request("code_challenge is required"));
    };

    if params.code_challenge_method.as_deref() != Some(S256) {
        return redirect_error(OAuthError::invalid_request(
            "code_challenge_method must be 'S256'",
        ));
    }

    if !validate_code_challenge(code_challenge) {
        return redirect_error(OAuthError::invalid_request("Invalid code_challenge format"));
    }

    let Some(scope) = state.config.resolve_scope(params.scope.as_deref()) else {
        return redirect_error(OAuthError::invalid_scope("Requested scope is not supported"));
    };

    let code = generate_token();
    let authorization_code = AuthorizationCode {
        code_hash: hash_token(&code),
        client_id: client.client_id.clone(),
        redirect_uri: redirect_uri.to_string(),
        code_challenge: code_challenge.to_string(),
        code_challenge_method: S256.to_string(),
        scope,
        created_at: now,
        expires_at: now + Duration::seconds(state.config.code_ttl_secs as i64),
        consumed: false,
    };

    if let Err(e) = state.store.save_code(&authorization_code, now).await {
        error!(error = %e, "Token store operation failed");
        return redirect_error(OAuthError::server_error("Internal server error"));
    }

    info!(client_id, "Issued authorization code");

    redirect_with(redirect_uri, &[("code", code.as_str())], client_state)
}

fn bad_request(error: OAuthError) -> Response {
    (StatusCode::BAD_REQUEST, Json(error)).into_response()
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(OAuthError::server_error("Internal server error")),
    )
        .into_response()
}

fn error_redirect(redirect_uri: &str, error: &OAuthError, state: Option<&str>) -> Response {
    let mut params = vec![("error", error.error.as_str())];
    if let Some(description) = error.error_description.as_deref() {
        params.push(("error_description", description));
    }
    redirect_with(redirect_uri, &params, state)
}

/// 302 to `redirect_uri` with `params` (and `state`, when given) appended to
/// any query it already carries
fn redirect_with(redirect_uri: &str, params: &[(&str, &str)], state: Option<&str>) -> Response {
    let Ok(mut location) = Url::parse(redirect_uri) else {
        // Registered URIs are validated on the way in
        return server_error();
    };

    {
        let mut query = location.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }

    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(response: &Response) -> Url {
        let value = response.headers()[header::LOCATION].to_str().unwrap();
        Url::parse(value).unwrap()
    }

    #[test]
    fn test_redirect_preserves_existing_query() {
        let response = redirect_with(
            "https://example.com/cb?tenant=7",
            &[("code", "abc")],
            Some("xyz"),
        );
        assert_eq!(response.status(), StatusCode::FOUND);

        let url = location(&response);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tenant".to_string(), "7".to_string()),
                ("code".to_string(), "abc".to_string()),
                ("state".to_string(), "xyz".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_redirect_carries_error_and_state() {
        let response = error_redirect(
            "https://example.com/cb",
            &OAuthError::invalid_request("code_challenge is required"),
            Some("s 1"),
        );
        let url = location(&response);
        let pairs: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(pairs["error"], "invalid_request");
        assert_eq!(pairs["error_description"], "code_challenge is required");
        assert_eq!(pairs["state"], "s 1");
    }

    #[test]
    fn test_redirect_without_state() {
        let response = redirect_with("http://localhost:3000/cb", &[("code", "abc")], None);
        let url = location(&response);
        assert!(url.query_pairs().all(|(k, _)| k != "state"));
    }
}
