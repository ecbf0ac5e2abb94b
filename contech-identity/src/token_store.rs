//! Token Store - durable persistence of the credential token
//!
//! The store holds exactly one opaque string under a named key. It performs no
//! validation of the token; that is the identity service's job.

use contech_core::{storage_error, ContechConfig, ContechResult};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Synchronous key/value persistence of a single credential token
pub trait TokenStore: Send + Sync {
    /// Persist `token`, replacing any previous value
    fn save(&self, token: &str) -> ContechResult<()>;

    /// Current token, `None` before any save or after a clear
    fn load(&self) -> ContechResult<Option<String>>;

    /// Remove the token. Clearing an empty store succeeds.
    fn clear(&self) -> ContechResult<()>;
}

/// File-backed store: the token lives in `<dir>/<key>`
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store under `dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P, key: &str) -> ContechResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            storage_error!(
                format!("Failed to create token directory {}: {}", dir.display(), e),
                "token_store",
                e
            )
        })?;

        let path = dir.join(key);
        info!("Token store initialized at: {}", path.display());
        Ok(Self { path })
    }

    /// Store configured by `storage.data_dir` and `storage.token_key`
    pub fn from_config(config: &ContechConfig) -> ContechResult<Self> {
        Self::new(config.resolved_data_dir(), &config.storage.token_key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, token: &str) -> ContechResult<()> {
        let temp = self.temp_path();
        std::fs::write(&temp, token).map_err(|e| {
            storage_error!(format!("Failed to write token: {}", e), "token_store", e)
        })?;
        restrict_permissions(&temp)?;
        std::fs::rename(&temp, &self.path).map_err(|e| {
            storage_error!(format!("Failed to replace token: {}", e), "token_store", e)
        })?;

        debug!("Saved token to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> ContechResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error!(
                format!("Failed to read token: {}", e),
                "token_store",
                e
            )),
        }
    }

    fn clear(&self) -> ContechResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed token at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error!(
                format!("Failed to remove token: {}", e),
                "token_store",
                e
            )),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> ContechResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
        storage_error!(
            format!("Failed to set token permissions: {}", e),
            "token_store",
            e
        )
    })
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> ContechResult<()> {
    Ok(())
}

/// In-process store for tests and sessions that must not touch disk
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: &str) -> ContechResult<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    fn load(&self) -> ContechResult<Option<String>> {
        Ok(self.token.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn clear(&self) -> ContechResult<()> {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
