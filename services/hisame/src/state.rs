//! Application state
//!
//! Constructed once in `main` and passed down explicitly. Holds the loaded
//! settings and the current AniList token behind async locks, plus the
//! store that persists the token between runs.

use anilist_auth::TokenStore;
use common::Secret;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::UserConfig;
use crate::error::{Error, Result};

pub struct AppState {
    config: RwLock<UserConfig>,
    auth_token: RwLock<Option<Secret<String>>>,
    token_store: TokenStore,
}

impl AppState {
    pub fn new(config: UserConfig, token_store: TokenStore) -> Self {
        Self {
            config: RwLock::new(config),
            auth_token: RwLock::new(None),
            token_store,
        }
    }

    /// Snapshot of the current settings.
    pub async fn config(&self) -> UserConfig {
        self.config.read().await.clone()
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    pub async fn auth_token(&self) -> Option<Secret<String>> {
        self.auth_token.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth_token.read().await.is_some()
    }

    /// Replace the in-memory token. Does not touch the disk.
    pub async fn set_auth_token(&self, token: Secret<String>) {
        *self.auth_token.write().await = Some(token);
        debug!("authentication token updated");
    }

    /// Load the saved token into memory.
    ///
    /// Returns whether a token was found; a missing file is not an error.
    pub async fn load_auth_token(&self) -> Result<bool> {
        let mut slot = self.auth_token.write().await;
        let loaded = self.token_store.load().await?;
        let found = loaded.is_some();
        *slot = loaded;
        Ok(found)
    }

    /// Persist the in-memory token.
    pub async fn save_auth_token(&self) -> Result<()> {
        let slot = self.auth_token.read().await;
        let token = slot.as_ref().ok_or(Error::NoToken)?;
        self.token_store.save(token).await?;
        Ok(())
    }

    /// Forget the token in memory and delete it from disk.
    pub async fn clear_auth_token(&self) -> Result<()> {
        let mut slot = self.auth_token.write().await;
        *slot = None;
        self.token_store.clear().await?;
        info!("logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TitleLanguage;
    use std::path::Path;

    fn state_in(dir: &Path) -> AppState {
        AppState::new(
            UserConfig::default(),
            TokenStore::new(dir.join("hisame").join("token")),
        )
    }

    #[tokio::test]
    async fn starts_unauthenticated_with_given_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = UserConfig::default();
        config.anime.title_language = TitleLanguage::Native;
        let state = AppState::new(config.clone(), TokenStore::new(dir.path().join("token")));

        assert_eq!(state.config().await, config);
        assert!(!state.is_authenticated().await);
        assert!(state.auth_token().await.is_none());
    }

    #[tokio::test]
    async fn load_without_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        assert!(!state.load_auth_token().await.unwrap());
        assert!(!state.is_authenticated().await);
    }

    #[tokio::test]
    async fn blank_token_file_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let path = state.token_store().path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();

        assert!(!state.load_auth_token().await.unwrap());
        assert!(!state.is_authenticated().await);
    }

    #[tokio::test]
    async fn save_then_load_in_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        state.set_auth_token(Secret::new("persisted".into())).await;
        state.save_auth_token().await.unwrap();

        let fresh = state_in(dir.path());
        assert!(fresh.load_auth_token().await.unwrap());
        assert_eq!(fresh.auth_token().await.unwrap().expose(), "persisted");
    }

    #[tokio::test]
    async fn save_without_token_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let err = state.save_auth_token().await.unwrap_err();
        assert!(matches!(err, Error::NoToken), "got: {err:?}");
        assert!(!state.token_store().path().exists());
    }

    #[tokio::test]
    async fn clear_forgets_memory_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        state.set_auth_token(Secret::new("bye".into())).await;
        state.save_auth_token().await.unwrap();

        state.clear_auth_token().await.unwrap();
        assert!(!state.is_authenticated().await);
        assert!(!state.token_store().path().exists());

        // clearing twice is fine
        state.clear_auth_token().await.unwrap();
    }
}
