//! File-based credential storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use directories::BaseDirs;

use super::{CredentialStore, SessionRecord, SessionState};
use crate::auth::{Credential, UserIdentity};
use crate::{Error, Result};

const APP_DIR: &str = "admin-client";
const SESSION_FILE: &str = "session.json";

/// Credential store persisted as a JSON file.
///
/// Reads are served from an in-memory snapshot and never touch the disk.
/// Writes update the snapshot, drop the snapshot lock, then rewrite the file
/// with blocking `std::fs` calls. Writers are serialized by a separate lock,
/// so the file always reflects the last write, but each writer blocks its
/// thread for one temp-file write and rename. A failed file write is logged
/// and leaves the snapshot as written.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<SessionState>,
    writing: Mutex<()>,
}

impl FileStore {
    /// Default session file under the platform configuration directory.
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR).join(SESSION_FILE))
    }

    /// Open the session file at the default location.
    pub fn open_default() -> Result<Self> {
        let path = Self::default_path()
            .ok_or_else(|| Error::Config("No configuration directory available".into()))?;
        Self::open(path)
    }

    /// Open the session file at `path`, loading any stored session.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = Self::load(&path)?;

        tracing::debug!(
            path = %path.display(),
            authenticated = state.credential.is_some(),
            "Loaded session file"
        );

        Ok(Self {
            path,
            state: RwLock::new(state),
            writing: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<SessionState> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SessionState::default()),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read session file: {}",
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(SessionState::default());
        }

        let record: SessionRecord = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("Failed to parse session file: {}", e)))?;

        Ok(record.into())
    }

    fn persist(&self, record: Option<SessionRecord>) {
        let result = match record {
            Some(record) => self.write_file(&record),
            None => self.remove_file(),
        };

        if let Err(e) = result {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist session file"
            );
        }
    }

    fn write_file(&self, record: &SessionRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_vec_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)
    }

    fn remove_file(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Apply `f` to the snapshot and persist it if `f` reports a change.
    fn update(&self, f: impl FnOnce(&mut SessionState) -> bool) -> bool {
        let _writing = self.writing.lock().unwrap_or_else(|e| e.into_inner());

        let record = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if !f(&mut state) {
                return false;
            }
            (!state.is_empty()).then(|| SessionRecord::from(&*state))
        };

        self.persist(record);
        true
    }
}

impl CredentialStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self) -> Option<Credential> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .credential
            .clone()
    }

    fn set(&self, credential: Credential) {
        self.update(|state| {
            state.set_credential(credential);
            true
        });
    }

    fn clear(&self) {
        self.update(|state| {
            state.clear();
            true
        });
    }

    fn user(&self) -> Option<UserIdentity> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .user
            .clone()
    }

    fn set_user(&self, user: UserIdentity) {
        self.update(|state| {
            state.user = Some(user);
            true
        });
    }

    fn replace(&self, credential: Credential, user: Option<UserIdentity>) {
        self.update(|state| {
            state.credential = Some(credential);
            state.user = user;
            true
        });
    }

    fn compare_and_set(&self, expected_refresh: &str, next: Option<Credential>) -> bool {
        self.update(|state| state.compare_and_set(expected_refresh, next))
    }
}
