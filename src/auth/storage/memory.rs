//! In-process credential storage.

use std::sync::RwLock;

use super::{CredentialStore, SessionState};
use crate::auth::{Credential, UserIdentity};

/// Credential store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<SessionState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            state: RwLock::new(SessionState {
                credential: Some(credential),
                user: None,
            }),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self) -> Option<Credential> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .credential
            .clone()
    }

    fn set(&self, credential: Credential) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_credential(credential);
    }

    fn clear(&self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn user(&self) -> Option<UserIdentity> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .user
            .clone()
    }

    fn set_user(&self, user: UserIdentity) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).user = Some(user);
    }

    fn replace(&self, credential: Credential, user: Option<UserIdentity>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.credential = Some(credential);
        state.user = user;
    }

    fn compare_and_set(&self, expected_refresh: &str, next: Option<Credential>) -> bool {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .compare_and_set(expected_refresh, next)
    }
}
