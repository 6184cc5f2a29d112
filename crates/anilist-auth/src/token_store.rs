//! On-disk storage for the AniList bearer token
//!
//! The token is stored as the raw string in `<data dir>/hisame/token`.
//! Writes use temp-file + rename so a crash never leaves a half-written
//! token behind, and the file is created with 0600 permissions inside a
//! 0700 directory.

use std::path::{Path, PathBuf};

use common::Secret;
use tracing::{debug, error, info, warn};

use crate::constants::{APP_DIR_NAME, TOKEN_FILE_NAME};
use crate::error::{Error, Result};

/// Location of the persisted token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store backed by an explicit file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the platform's per-user data directory.
    pub fn at_default_location() -> Result<Self> {
        Self::default_path().map(Self::new)
    }

    /// `<data dir>/hisame/token`, where the data dir is `$XDG_DATA_HOME`
    /// (or `~/.local/share`) on Linux, `~/Library/Application Support` on
    /// macOS and `%APPDATA%` on Windows.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::data_dir().ok_or(Error::NoDataDir)?;
        Ok(dir.join(APP_DIR_NAME).join(TOKEN_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved token.
    ///
    /// A missing or blank file means there is no prior session and yields
    /// `None`.
    pub async fn load(&self) -> Result<Option<Secret<String>>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => {
                warn!(path = %self.path.display(), "token file is empty, ignoring it");
                Ok(None)
            }
            Ok(contents) => {
                info!(path = %self.path.display(), "authentication token loaded from disk");
                Ok(Some(Secret::new(contents)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no token file found, starting without authentication");
                Ok(None)
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read token file");
                Err(Error::Io(format!("reading token file: {e}")))
            }
        }
    }

    /// Persist `token`, replacing any previous one.
    pub async fn save(&self, token: &Secret<String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;

        create_private_dir(dir).await?;
        write_atomic(&self.path, token.expose()).await?;

        info!(path = %self.path.display(), "authentication token saved to disk");
        Ok(())
    }

    /// Delete the saved token. A missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no token file to delete");
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to delete token file");
                return Err(Error::Io(format!("deleting token file: {e}")));
            }
        }

        info!("authentication token file deleted");
        Ok(())
    }
}

/// Create `dir` (and parents) with 0700 permissions on unix.
async fn create_private_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(dir, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token directory permissions: {e}")))?;
    }

    Ok(())
}

/// Write the token through a temp file in the same directory, then rename
/// it over the target.
async fn write_atomic(path: &Path, token: &str) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".{TOKEN_FILE_NAME}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, token.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted token");
    Ok(())
}
