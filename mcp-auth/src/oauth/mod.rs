//! OAuth 2.1 Authorization Server
//!
//! Machine-to-machine authorization for the bridge, following:
//! - OAuth 2.1 (draft-ietf-oauth-v2-1) with mandatory PKCE (S256 only)
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7662: Token Introspection
//! - RFC 7009: Token Revocation
//! - RFC 8414: Authorization Server Metadata
//! - RFC 9728: Protected Resource Metadata
//!
//! Codes and tokens are opaque 256-bit random strings. The store only ever
//! sees their SHA-256 digests.

pub mod authorize;
pub mod clock;
pub mod crypto;
pub mod error;
pub mod file_store;
pub mod introspect;
pub mod metadata;
pub mod models;
pub mod pkce;
pub mod registration;
pub mod revoke;
pub mod storage;
pub mod token;

pub use authorize::authorize;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthServerError;
pub use file_store::FileTokenStore;
pub use introspect::{Introspector, introspect_endpoint};
pub use metadata::{authorization_server_metadata, protected_resource_metadata};
pub use registration::register_client;
pub use revoke::revoke_endpoint;
pub use storage::{MemoryTokenStore, StoreError, TokenStore};
pub use token::token_endpoint;

use crate::config::{AuthServerConfig, StorageConfig};
use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Shared state for every OAuth endpoint
#[derive(Clone)]
pub struct OAuthState {
    pub store: Arc<dyn TokenStore>,
    pub config: Arc<AuthServerConfig>,
    pub clock: Arc<dyn Clock>,
}

impl OAuthState {
    pub fn new(store: Arc<dyn TokenStore>, config: AuthServerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source (tests use [`ManualClock`])
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default configuration over a fresh [`MemoryTokenStore`]
    pub fn new_in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()), AuthServerConfig::default())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// An [`Introspector`] sharing this state's store and clock
    pub fn introspector(&self) -> Introspector {
        Introspector::new(self.store.clone(), self.clock.clone())
    }
}

/// Open the configured storage backend
pub async fn open_store(storage: &StorageConfig) -> Result<Arc<dyn TokenStore>, StoreError> {
    match storage {
        StorageConfig::Memory => {
            info!("Using in-memory token store");
            Ok(Arc::new(MemoryTokenStore::new()))
        }
        StorageConfig::File { path } => {
            info!(path = %path.display(), "Using file token store");
            Ok(Arc::new(FileTokenStore::new(path.clone()).await?))
        }
    }
}

/// Create the OAuth router with all endpoints mounted at the root
pub fn oauth_router() -> Router<OAuthState> {
    Router::new()
        // RFC 8414: Authorization Server Metadata
        .route(
            "/.well-known/oauth-authorization-server",
            get(authorization_server_metadata),
        )
        // RFC 9728: Protected Resource Metadata
        .route(
            "/.well-known/oauth-protected-resource",
            get(protected_resource_metadata),
        )
        // RFC 7591: Dynamic Client Registration
        .route("/register", post(register_client))
        // Authorization endpoint (PKCE required)
        .route("/authorize", get(authorize))
        // Token endpoint (with refresh token rotation)
        .route("/token", post(token_endpoint))
        // RFC 7662: Token Introspection
        .route("/introspect", post(introspect_endpoint))
        // RFC 7009: Token Revocation
        .route("/revoke", post(revoke_endpoint))
}
