//! # BuildGate Authorization Server
//!
//! The OAuth 2.1 side of BuildGate: dynamic client registration, PKCE-bound
//! authorization codes, opaque bearer tokens with TTL-checked storage, and
//! the introspection function the protocol bridge trusts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use buildgate_auth::{AuthServerConfig, OAuthState, oauth_router, open_store};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthServerConfig::default();
//! config.validate()?;
//!
//! let store = open_store(&config.storage).await?;
//! let app = oauth_router().with_state(OAuthState::new(store, config));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | POST | `/register` | RFC 7591 client registration |
//! | GET | `/authorize` | Issue an authorization code (302) |
//! | POST | `/token` | `authorization_code` and `refresh_token` grants |
//! | POST | `/introspect` | RFC 7662 introspection |
//! | POST | `/revoke` | RFC 7009 revocation |
//! | GET | `/.well-known/oauth-authorization-server` | RFC 8414 metadata |
//! | GET | `/.well-known/oauth-protected-resource` | RFC 9728 metadata |
//!
//! ## Storage
//!
//! All cross-request state lives behind [`TokenStore`]. Expiry is checked on
//! every read, so an expired entry is indistinguishable from one that was
//! never written; [`TokenStore::purge_expired`] only reclaims space.

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod oauth;

pub use config::{AuthServerConfig, ConfigError, StorageConfig};
pub use oauth::{
    AuthServerError, Clock, FileTokenStore, Introspector, ManualClock, MemoryTokenStore,
    OAuthState, StoreError, SystemClock, TokenStore, oauth_router, open_store,
};
pub use oauth::models::IntrospectionResponse;
