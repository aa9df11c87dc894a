//! End-to-end OAuth 2.1 flow tests
//!
//! register -> authorize -> token -> introspect -> refresh -> revoke, driven
//! over HTTP with a manual clock standing in for the passage of time

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use buildgate_auth::oauth::{
    FileTokenStore, ManualClock, OAuthState, crypto::generate_token, oauth_router,
    pkce::s256_challenge,
};
use buildgate_auth::AuthServerConfig;
use chrono::Duration;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;

const REDIRECT_URI: &str = "https://example.com/callback";

/// Helper to create test app with a manual clock
fn test_app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let state = OAuthState::new_in_memory().with_clock(clock.clone());
    (oauth_router().with_state(state), clock)
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(json!({})))
}

async fn post_form(app: Router, uri: &str, params: &[(&str, &str)]) -> (StatusCode, Value) {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();

    let request = Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap_or(json!({})))
}

struct Client {
    id: String,
    secret: Option<String>,
}

impl Client {
    fn credentials(&self) -> Vec<(&str, &str)> {
        let mut params = vec![("client_id", self.id.as_str())];
        if let Some(secret) = self.secret.as_deref() {
            params.push(("client_secret", secret));
        }
        params
    }
}

async fn register(app: Router, auth_method: &str) -> Client {
    let (status, body) = post_json(
        app,
        "/register",
        json!({
            "client_name": "Flow Test",
            "redirect_uris": [REDIRECT_URI],
            "token_endpoint_auth_method": auth_method
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    Client {
        id: body["client_id"].as_str().unwrap().to_string(),
        secret: body["client_secret"].as_str().map(str::to_string),
    }
}

/// Run GET /authorize and return the code from the redirect
async fn authorize(app: Router, client: &Client, verifier: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code")
        .append_pair("client_id", &client.id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("state", "xyz")
        .append_pair("code_challenge", &s256_challenge(verifier))
        .append_pair("code_challenge_method", "S256")
        .finish();

    let request = Request::builder()
        .uri(format!("/authorize?{query}"))
        .method("GET")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(REDIRECT_URI));
    let params: HashMap<String, String> = url::Url::parse(location)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();
    assert_eq!(params["state"], "xyz");
    params["code"].clone()
}

async fn exchange(app: Router, client: &Client, code: &str, verifier: &str) -> (StatusCode, Value) {
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", REDIRECT_URI),
        ("code_verifier", verifier),
    ];
    params.extend(client.credentials());
    post_form(app, "/token", &params).await
}

async fn refresh(app: Router, client: &Client, refresh_token: &str) -> (StatusCode, Value) {
    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ];
    params.extend(client.credentials());
    post_form(app, "/token", &params).await
}

async fn is_active(app: Router, token: &str) -> bool {
    let (status, body) = post_form(app, "/introspect", &[("token", token)]).await;
    assert_eq!(status, StatusCode::OK);
    body["active"].as_bool().unwrap()
}

#[tokio::test]
async fn test_full_authorization_code_flow() {
    let (app, clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();

    let code = authorize(app.clone(), &client, &verifier).await;
    let (status, tokens) = exchange(app.clone(), &client, &code, &verifier).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert_eq!(tokens["scope"], "mcp");
    let access_token = tokens["access_token"].as_str().unwrap();
    assert!(tokens["refresh_token"].is_string());

    let (_, introspection) =
        post_form(app.clone(), "/introspect", &[("token", access_token)]).await;
    assert_eq!(introspection["active"], true);
    assert_eq!(introspection["client_id"], client.id.as_str());
    assert_eq!(introspection["scope"], "mcp");
    assert_eq!(introspection["token_type"], "Bearer");
    assert_eq!(
        introspection["exp"].as_i64().unwrap() - introspection["iat"].as_i64().unwrap(),
        3600
    );

    // Expired tokens look exactly like tokens that never existed
    clock.advance(Duration::seconds(3601));
    let (_, expired) = post_form(app.clone(), "/introspect", &[("token", access_token)]).await;
    let (_, unknown) = post_form(app, "/introspect", &[("token", "never-issued")]).await;
    assert_eq!(expired, json!({"active": false}));
    assert_eq!(expired, unknown);
}

#[tokio::test]
async fn test_code_can_only_be_exchanged_once() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;

    let (first, _) = exchange(app.clone(), &client, &code, &verifier).await;
    let (second, body) = exchange(app, &client, &code, &verifier).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_concurrent_exchange_has_single_winner() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;

    let (a, b) = tokio::join!(
        exchange(app.clone(), &client, &code, &verifier),
        exchange(app.clone(), &client, &code, &verifier),
    );

    let statuses = [a.0, b.0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(),
        1
    );
}

#[tokio::test]
async fn test_mutated_verifiers_are_rejected() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;

    for position in 0..verifier.len() {
        let mut bytes = verifier.clone().into_bytes();
        bytes[position] ^= 0x01;
        let mutated = String::from_utf8(bytes).unwrap();

        let (status, body) = exchange(app.clone(), &client, &code, &mutated).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "position {position}");
        assert_eq!(body["error"], "invalid_grant");
    }

    // Failed attempts do not burn the code
    let (status, _) = exchange(app, &client, &code, &verifier).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_code_is_rejected() {
    let (app, clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;

    clock.advance(Duration::seconds(121));

    let (status, body) = exchange(app, &client, &code, &verifier).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_code_bound_to_redirect_uri_and_client() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let other = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;

    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", "https://example.com/other"),
        ("code_verifier", verifier.as_str()),
    ];
    params.extend(client.credentials());
    let (status, wrong_redirect) = post_form(app.clone(), "/token", &params).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, wrong_client) = exchange(app.clone(), &other, &code, &verifier).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Both failures carry the same body
    assert_eq!(wrong_redirect, wrong_client);
    assert_eq!(wrong_client["error"], "invalid_grant");

    let (status, _) = exchange(app, &client, &code, &verifier).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_confidential_client_requires_secret() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;

    let wrong = Client {
        id: client.id.clone(),
        secret: Some("wrong-secret".to_string()),
    };
    let (status, body) = exchange(app.clone(), &wrong, &code, &verifier).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_client");

    let missing = Client {
        id: client.id.clone(),
        secret: None,
    };
    let (status, _) = exchange(app, &missing, &code, &verifier).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_client_flow() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "none").await;
    assert!(client.secret.is_none());

    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (status, tokens) = exchange(app.clone(), &client, &code, &verifier).await;

    assert_eq!(status, StatusCode::OK);
    assert!(is_active(app, tokens["access_token"].as_str().unwrap()).await);
}

#[tokio::test]
async fn test_refresh_token_rotation() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (_, tokens) = exchange(app.clone(), &client, &code, &verifier).await;
    let first_refresh = tokens["refresh_token"].as_str().unwrap();

    let (status, rotated) = refresh(app.clone(), &client, first_refresh).await;
    assert_eq!(status, StatusCode::OK);
    let second_refresh = rotated["refresh_token"].as_str().unwrap();
    assert_ne!(first_refresh, second_refresh);
    assert_ne!(tokens["access_token"], rotated["access_token"]);
    assert_eq!(rotated["scope"], "mcp");
    assert!(is_active(app.clone(), rotated["access_token"].as_str().unwrap()).await);

    // The old refresh token is gone
    let (status, body) = refresh(app.clone(), &client, first_refresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");

    // Another client cannot use it
    let other = register(app.clone(), "client_secret_post").await;
    let (status, _) = refresh(app, &other, second_refresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_refresh_token_is_rejected() {
    let (app, clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (_, tokens) = exchange(app.clone(), &client, &code, &verifier).await;

    clock.advance(Duration::days(31));

    let (status, body) = refresh(app, &client, tokens["refresh_token"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_revoke_access_token() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (_, tokens) = exchange(app.clone(), &client, &code, &verifier).await;
    let access_token = tokens["access_token"].as_str().unwrap();

    let (status, _) = post_form(app.clone(), "/revoke", &[("token", access_token)]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!is_active(app.clone(), access_token).await);

    // The refresh token survives an access token revocation
    let (status, _) = refresh(app, &client, tokens["refresh_token"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_revoke_refresh_token_cascades() {
    let (app, _clock) = test_app();
    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (_, tokens) = exchange(app.clone(), &client, &code, &verifier).await;
    let access_token = tokens["access_token"].as_str().unwrap();
    let refresh_token = tokens["refresh_token"].as_str().unwrap();

    let (status, _) = post_form(
        app.clone(),
        "/revoke",
        &[("token", refresh_token), ("token_type_hint", "refresh_token")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(!is_active(app.clone(), access_token).await);
    let (status, _) = refresh(app, &client, refresh_token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_disabled() {
    let config = AuthServerConfig {
        refresh_tokens_enabled: false,
        ..Default::default()
    };
    let state = OAuthState::new(Arc::new(buildgate_auth::MemoryTokenStore::new()), config);
    let app = oauth_router().with_state(state);

    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (status, tokens) = exchange(app.clone(), &client, &code, &verifier).await;

    assert_eq!(status, StatusCode::OK);
    assert!(tokens.get("refresh_token").is_none());

    let (status, body) = refresh(app, &client, "anything").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_flow_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");

    let store = FileTokenStore::new(&path).await.unwrap();
    let app = oauth_router().with_state(OAuthState::new(
        Arc::new(store),
        AuthServerConfig::default(),
    ));

    let client = register(app.clone(), "client_secret_post").await;
    let verifier = generate_token();
    let code = authorize(app.clone(), &client, &verifier).await;
    let (_, tokens) = exchange(app, &client, &code, &verifier).await;

    // A second store over the same file sees everything the first wrote
    let reopened = FileTokenStore::new(&path).await.unwrap();
    let app = oauth_router().with_state(OAuthState::new(
        Arc::new(reopened),
        AuthServerConfig::default(),
    ));

    assert!(is_active(app.clone(), tokens["access_token"].as_str().unwrap()).await);
    let (status, _) = exchange(app, &client, &code, &verifier).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
