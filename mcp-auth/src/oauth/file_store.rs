//! JSON file token store
//!
//! Every operation re-reads the file, so a restarted process (or a second
//! handle on the same path) sees all prior writes. Mutations through one
//! handle are serialized with an async mutex and land via write-to-temp +
//! rename, so a reader never sees a half-written file. There is no
//! cross-process lock: run one writer per file.

use crate::oauth::models::{AccessToken, AuthorizationCode, OAuthClient, RefreshToken};
use crate::oauth::storage::{StoreError, StoreSnapshot, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// Token store persisted to a single JSON file
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// Open (or lazily create) the store at `path`
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let mut perms = fs::metadata(parent).await?.permissions();
                    perms.set_mode(0o700); // Owner only
                    fs::set_permissions(parent, perms).await?;
                }
            }
        }

        debug!(path = %path.display(), "Opened file token store");
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoreSnapshot, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(StoreSnapshot::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreSnapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.path.with_extension("tmp");

        fs::write(&tmp_path, &bytes).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&tmp_path).await?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&tmp_path, perms).await?;
        }

        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreSnapshot) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let snapshot = self.load().await?;
        Ok(f(&snapshot))
    }

    /// Apply `f` and write back only if it reports a change
    async fn update<T>(
        &self,
        f: impl FnOnce(&mut StoreSnapshot) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let mut snapshot = self.load().await?;
        let (result, changed) = f(&mut snapshot)?;
        if changed {
            self.persist(&snapshot).await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn save_client(
        &self,
        client: &OAuthClient,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(|s| s.insert_client(client, now).map(|()| ((), true)))
            .await
    }

    async fn get_client(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OAuthClient>, StoreError> {
        self.read(|s| s.client(client_id, now)).await
    }

    async fn save_code(
        &self,
        code: &AuthorizationCode,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(|s| s.insert_code(code, now).map(|()| ((), true)))
            .await
    }

    async fn get_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        self.read(|s| s.code(code_hash, now)).await
    }

    async fn consume_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        self.update(|s| {
            let code = s.consume_code(code_hash, now);
            let changed = code.is_some();
            Ok((code, changed))
        })
        .await
    }

    async fn save_access_token(
        &self,
        token: &AccessToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(|s| s.insert_access_token(token, now).map(|()| ((), true)))
            .await
    }

    async fn get_access_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessToken>, StoreError> {
        self.read(|s| s.access_token(token_hash, now)).await
    }

    async fn revoke_access_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        self.update(|s| {
            let removed = s.remove_access_token(token_hash);
            Ok((removed, removed))
        })
        .await
    }

    async fn save_refresh_token(
        &self,
        token: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(|s| s.insert_refresh_token(token, now).map(|()| ((), true)))
            .await
    }

    async fn get_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        self.read(|s| s.refresh_token(token_hash, now)).await
    }

    async fn take_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        self.update(|s| {
            let existed = s.refresh_tokens.contains_key(token_hash);
            Ok((s.take_refresh_token(token_hash, now), existed))
        })
        .await
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        self.update(|s| {
            let token = s.revoke_refresh_token(token_hash);
            let changed = token.is_some();
            Ok((token, changed))
        })
        .await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.update(|s| {
            let removed = s.purge_expired(now);
            Ok((removed, removed > 0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::storage::tests::{test_access_token, test_client, test_code};
    use chrono::Duration;
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir) -> FileTokenStore {
        FileTokenStore::new(dir.path().join("state").join("tokens.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let now = Utc::now();

        assert!(store.get_client("test_client", now).await.unwrap().is_none());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();

        {
            let store = store_in(&dir).await;
            store.save_client(&test_client(now), now).await.unwrap();
            store.save_access_token(&test_access_token(now), now).await.unwrap();
        }

        let reopened = store_in(&dir).await;
        assert!(reopened.get_client("test_client", now).await.unwrap().is_some());
        assert!(
            reopened
                .get_access_token("access_hash_123", now)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_two_handles_share_state() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();
        let a = store_in(&dir).await;
        let b = store_in(&dir).await;

        a.save_code(&test_code(now), now).await.unwrap();
        assert!(b.consume_code("code_hash_123", now).await.unwrap().is_some());
        assert!(a.consume_code("code_hash_123", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_applies_on_read() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let now = Utc::now();

        store.save_access_token(&test_access_token(now), now).await.unwrap();
        let later = now + Duration::hours(1);
        assert!(
            store
                .get_access_token("access_hash_123", later)
                .await
                .unwrap()
                .is_none()
        );

        assert_eq!(store.purge_expired(later).await.unwrap(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        let now = Utc::now();
        store.save_client(&test_client(now), now).await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        std::fs::write(store.path(), b"{not json").unwrap();

        let result = store.get_client("test_client", Utc::now()).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
