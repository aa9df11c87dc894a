//! OAuth 2.1 Data Models
//!
//! Stored entities (clients, authorization codes, access and refresh tokens)
//! and the request/response bodies of each endpoint.
//!
//! Codes and tokens are keyed by the SHA-256 digest of their opaque value; the
//! plaintext only ever exists in the HTTP response that hands it out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Confidential client sending `client_secret` in the form body
    #[default]
    ClientSecretPost,
    /// Public client, PKCE is its only proof
    None,
}

impl TokenEndpointAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client_secret_post" => Some(Self::ClientSecretPost),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// OAuth client registered via dynamic client registration (RFC 7591)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    /// SHA-256 of the secret; `None` for public clients
    pub client_secret_hash: Option<String>,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    pub created_at: DateTime<Utc>,
    /// Registration lifetime; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthClient {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == TokenEndpointAuthMethod::None
    }

    /// Exact string match, no normalization
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    pub fn allows_grant(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }
}

/// Authorization code issued by the authorization endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code_hash: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub scope: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Flipped exactly once, by the exchange that wins
    pub consumed: bool,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Opaque bearer token issued by the token endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub token_hash: String,
    pub client_id: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Refresh token; rotated on every use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token_hash: String,
    pub client_id: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Access tokens issued alongside this refresh token
    #[serde(default)]
    pub access_token_hashes: Vec<String>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Client registration request (RFC 7591)
#[derive(Debug, Deserialize)]
pub struct ClientRegistrationRequest {
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
    pub scope: Option<String>,
}

/// Client registration response (RFC 7591)
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientRegistrationResponse {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub client_id_issued_at: i64,
    /// Unix timestamp, 0 = never expires
    pub client_secret_expires_at: i64,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
}

/// Authorization request parameters.
///
/// Every field is optional at the type level so a missing parameter is
/// reported as `invalid_request` rather than a framework rejection.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

/// Token request parameters
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// Introspection request (RFC 7662)
#[derive(Debug, Default, Deserialize)]
pub struct IntrospectionRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
}

/// Introspection response (RFC 7662)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl IntrospectionResponse {
    /// The only answer given for unknown, expired or revoked tokens
    pub fn inactive() -> Self {
        Self {
            active: false,
            client_id: None,
            scope: None,
            exp: None,
            iat: None,
            token_type: None,
        }
    }

    pub fn active(token: &AccessToken) -> Self {
        Self {
            active: true,
            client_id: Some(token.client_id.clone()),
            scope: Some(token.scope.clone()),
            exp: Some(token.expires_at.timestamp()),
            iat: Some(token.issued_at.timestamp()),
            token_type: Some("Bearer".to_string()),
        }
    }
}

/// Revocation request (RFC 7009)
#[derive(Debug, Default, Deserialize)]
pub struct RevocationRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
}

/// Error response (RFC 6749 Section 5.2)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuthError {
    fn new(error: &str, description: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: Some(description.into()),
            error_uri: None,
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new("invalid_request", description)
    }

    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new("invalid_client", description)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new("invalid_grant", description)
    }

    pub fn unauthorized_client(description: impl Into<String>) -> Self {
        Self::new("unauthorized_client", description)
    }

    pub fn unsupported_grant_type(description: impl Into<String>) -> Self {
        Self::new("unsupported_grant_type", description)
    }

    pub fn unsupported_response_type(description: impl Into<String>) -> Self {
        Self::new("unsupported_response_type", description)
    }

    pub fn invalid_scope(description: impl Into<String>) -> Self {
        Self::new("invalid_scope", description)
    }

    /// RFC 7591 Section 3.2.2
    pub fn invalid_redirect_uri(description: impl Into<String>) -> Self {
        Self::new("invalid_redirect_uri", description)
    }

    /// RFC 7591 Section 3.2.2
    pub fn invalid_client_metadata(description: impl Into<String>) -> Self {
        Self::new("invalid_client_metadata", description)
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new("server_error", description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn client() -> OAuthClient {
        OAuthClient {
            client_id: "client".to_string(),
            client_secret_hash: None,
            client_name: "Test".to_string(),
            redirect_uris: vec!["https://example.com/callback".to_string()],
            grant_types: vec!["authorization_code".to_string()],
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = client();
        assert!(client.has_redirect_uri("https://example.com/callback"));
        assert!(!client.has_redirect_uri("https://example.com/callback/"));
        assert!(!client.has_redirect_uri("https://EXAMPLE.com/callback"));
        assert!(!client.has_redirect_uri("https://example.com/callback?x=1"));
    }

    #[test]
    fn test_client_expiry() {
        let now = Utc::now();
        let mut client = client();
        assert!(!client.is_expired(now));

        client.expires_at = Some(now + Duration::seconds(1));
        assert!(!client.is_expired(now));
        assert!(client.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_auth_method_wire_names() {
        assert_eq!(
            serde_json::to_value(TokenEndpointAuthMethod::ClientSecretPost).unwrap(),
            "client_secret_post"
        );
        assert_eq!(serde_json::to_value(TokenEndpointAuthMethod::None).unwrap(), "none");
        assert_eq!(
            TokenEndpointAuthMethod::parse("none"),
            Some(TokenEndpointAuthMethod::None)
        );
        assert_eq!(TokenEndpointAuthMethod::parse("private_key_jwt"), None);
    }

    #[test]
    fn test_inactive_introspection_has_only_active_field() {
        let value = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(value, serde_json::json!({"active": false}));
    }

    #[test]
    fn test_oauth_error_omits_empty_fields() {
        let value = serde_json::to_value(OAuthError::invalid_grant("Invalid grant")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"error": "invalid_grant", "error_description": "Invalid grant"})
        );
    }
}
