//! OAuth Storage Backend
//!
//! The [`TokenStore`] is the only place cross-request state lives. Every read
//! takes the caller's notion of "now" and treats an entry past its
//! `expires_at` exactly like an entry that was never written.
//!
//! Two backends share the same bookkeeping in [`StoreSnapshot`]:
//! [`MemoryTokenStore`] for tests and single-process deployments, and
//! [`FileTokenStore`](crate::oauth::file_store::FileTokenStore) for a durable
//! JSON file.

use crate::oauth::models::{AccessToken, AuthorizationCode, OAuthClient, RefreshToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A live entry already exists under this key
    #[error("Key already in use")]
    Conflict,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    General(String),
}

/// TTL-aware persistence for clients, codes and tokens.
///
/// Code and token keys are `hash_token(value)`; callers hash before calling.
#[async_trait]
pub trait TokenStore: Send + Sync {
    // Clients
    async fn save_client(&self, client: &OAuthClient, now: DateTime<Utc>)
    -> Result<(), StoreError>;
    async fn get_client(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthClient>, StoreError>;

    // Authorization codes
    async fn save_code(&self, code: &AuthorizationCode, now: DateTime<Utc>)
    -> Result<(), StoreError>;
    async fn get_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError>;
    /// Compare-and-set `consumed` from false to true. Returns the code only to
    /// the single caller that performed the transition.
    async fn consume_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError>;

    // Access tokens
    async fn save_access_token(
        &self,
        token: &AccessToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn get_access_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessToken>, StoreError>;
    async fn revoke_access_token(&self, token_hash: &str) -> Result<bool, StoreError>;

    // Refresh tokens
    async fn save_refresh_token(
        &self,
        token: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn get_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError>;
    /// Atomically remove a live refresh token and return it (rotation)
    async fn take_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError>;
    /// Remove a refresh token together with the access tokens issued with it
    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError>;

    /// Physically drop expired entries. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// The full store contents, with the TTL and single-use rules applied on
/// every operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub clients: HashMap<String, OAuthClient>,
    #[serde(default)]
    pub codes: HashMap<String, AuthorizationCode>,
    #[serde(default)]
    pub access_tokens: HashMap<String, AccessToken>,
    #[serde(default)]
    pub refresh_tokens: HashMap<String, RefreshToken>,
}

impl StoreSnapshot {
    pub fn insert_client(
        &mut self,
        client: &OAuthClient,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.client(&client.client_id, now).is_some() {
            return Err(StoreError::Conflict);
        }
        self.clients
            .insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    pub fn client(&self, client_id: &str, now: DateTime<Utc>) -> Option<OAuthClient> {
        self.clients
            .get(client_id)
            .filter(|c| !c.is_expired(now))
            .cloned()
    }

    pub fn insert_code(
        &mut self,
        code: &AuthorizationCode,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.code(&code.code_hash, now).is_some() {
            return Err(StoreError::Conflict);
        }
        self.codes.insert(code.code_hash.clone(), code.clone());
        Ok(())
    }

    pub fn code(&self, code_hash: &str, now: DateTime<Utc>) -> Option<AuthorizationCode> {
        self.codes
            .get(code_hash)
            .filter(|c| !c.is_expired(now))
            .cloned()
    }

    pub fn consume_code(&mut self, code_hash: &str, now: DateTime<Utc>) -> Option<AuthorizationCode> {
        let code = self.codes.get_mut(code_hash)?;
        if code.consumed || code.is_expired(now) {
            return None;
        }
        code.consumed = true;
        Some(code.clone())
    }

    pub fn insert_access_token(
        &mut self,
        token: &AccessToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.access_token(&token.token_hash, now).is_some() {
            return Err(StoreError::Conflict);
        }
        self.access_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    pub fn access_token(&self, token_hash: &str, now: DateTime<Utc>) -> Option<AccessToken> {
        self.access_tokens
            .get(token_hash)
            .filter(|t| !t.is_expired(now))
            .cloned()
    }

    pub fn remove_access_token(&mut self, token_hash: &str) -> bool {
        self.access_tokens.remove(token_hash).is_some()
    }

    pub fn insert_refresh_token(
        &mut self,
        token: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.refresh_token(&token.token_hash, now).is_some() {
            return Err(StoreError::Conflict);
        }
        self.refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    pub fn refresh_token(&self, token_hash: &str, now: DateTime<Utc>) -> Option<RefreshToken> {
        self.refresh_tokens
            .get(token_hash)
            .filter(|t| !t.is_expired(now))
            .cloned()
    }

    pub fn take_refresh_token(
        &mut self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Option<RefreshToken> {
        let token = self.refresh_tokens.remove(token_hash)?;
        (!token.is_expired(now)).then_some(token)
    }

    pub fn revoke_refresh_token(&mut self, token_hash: &str) -> Option<RefreshToken> {
        let token = self.refresh_tokens.remove(token_hash)?;
        for access_hash in &token.access_token_hashes {
            self.access_tokens.remove(access_hash);
        }
        Some(token)
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.len();
        self.clients.retain(|_, c| !c.is_expired(now));
        self.codes.retain(|_, c| !c.is_expired(now));
        self.access_tokens.retain(|_, t| !t.is_expired(now));
        self.refresh_tokens.retain(|_, t| !t.is_expired(now));
        before - self.len()
    }

    /// Total number of physically stored entries, live or not
    pub fn len(&self) -> usize {
        self.clients.len() + self.codes.len() + self.access_tokens.len() + self.refresh_tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory token store
///
/// A single `RwLock` guards the whole snapshot, so the consumed-flag
/// compare-and-set and refresh revocation are atomic with respect to every
/// other operation.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<StoreSnapshot>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents, including expired entries
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save_client(
        &self,
        client: &OAuthClient,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.write().await.insert_client(client, now)
    }

    async fn get_client(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthClient>, StoreError> {
        Ok(self.inner.read().await.client(client_id, now))
    }

    async fn save_code(
        &self,
        code: &AuthorizationCode,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.write().await.insert_code(code, now)
    }

    async fn get_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        Ok(self.inner.read().await.code(code_hash, now))
    }

    async fn consume_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        Ok(self.inner.write().await.consume_code(code_hash, now))
    }

    async fn save_access_token(
        &self,
        token: &AccessToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.write().await.insert_access_token(token, now)
    }

    async fn get_access_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.inner.read().await.access_token(token_hash, now))
    }

    async fn revoke_access_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.remove_access_token(token_hash))
    }

    async fn save_refresh_token(
        &self,
        token: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.write().await.insert_refresh_token(token, now)
    }

    async fn get_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.inner.read().await.refresh_token(token_hash, now))
    }

    async fn take_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.inner.write().await.take_refresh_token(token_hash, now))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.inner.write().await.revoke_refresh_token(token_hash))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.inner.write().await.purge_expired(now))
    }
}
