//! Credential persistence.
//!
//! The access token is short-lived and must not outlive the process; the
//! refresh token survives restarts but stays revocable via `clear`. Store
//! operations are infallible: an unavailable medium degrades to a logged
//! no-op.

use std::fs;
use std::path::PathBuf;

use log::warn;
use parking_lot::Mutex;

/// Persists and retrieves the access/refresh token pair.
///
/// Single-writer (the `SessionManager`), multi-reader. `save` and `clear`
/// always act on both tokens together.
pub trait CredentialStore: Send + Sync {
    fn save(&self, access_token: &str, refresh_token: &str);
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn clear(&self);
}

/// Fully volatile store: both tokens die with the process. Suited to tests
/// and short-lived tools.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tokens: Mutex<Option<(String, String)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, access_token: &str, refresh_token: &str) {
        *self.tokens.lock() = Some((access_token.to_string(), refresh_token.to_string()));
    }

    fn access_token(&self) -> Option<String> {
        self.tokens.lock().as_ref().map(|(a, _)| a.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens.lock().as_ref().map(|(_, r)| r.clone())
    }

    fn clear(&self) {
        *self.tokens.lock() = None;
    }
}

/// Split store: the access token lives in memory only and dies with the
/// process, the refresh token is persisted to a file and outlives it. Since
/// `restore()` requires both tokens, a restarted process stays anonymous
/// until the host calls `refresh()` directly to resume the session.
pub struct FileCredentialStore {
    access: Mutex<Option<String>>,
    path: PathBuf,
}

impl FileCredentialStore {
    /// `path` is the file holding the refresh token, created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            access: Mutex::new(None),
            path: path.into(),
        }
    }

    fn write_refresh(&self, refresh_token: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create credential directory {:?}: {}", parent, e);
                return;
            }
        }
        if let Err(e) = fs::write(&self.path, refresh_token) {
            warn!("Failed to persist refresh token to {:?}: {}", self.path, e);
            return;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)) {
                warn!("Failed to restrict permissions on {:?}: {}", self.path, e);
            }
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, access_token: &str, refresh_token: &str) {
        *self.access.lock() = Some(access_token.to_string());
        self.write_refresh(refresh_token);
    }

    fn access_token(&self) -> Option<String> {
        self.access.lock().clone()
    }

    fn refresh_token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(token) => {
                let token = token.trim().to_string();
                if token.is_empty() {
                    None
                } else {
                    Some(token)
                }
            }
            Err(_) => None,
        }
    }

    fn clear(&self) {
        *self.access.lock() = None;
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove refresh token file {:?}: {}", self.path, e);
            }
        }
    }
}
