//! Credential storage implementations.

mod file;
mod memory;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Credential, UserIdentity};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous key/value storage for the session credential.
///
/// Reads and writes never suspend: the refresh coordinator writes the new
/// token immediately before releasing queued requests, and every request reads
/// the store while it is being built. Implementations must be last-write-wins
/// and must never expose a state where only one of the two tokens changed.
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Store name for logging.
    fn name(&self) -> &str;

    /// Current credential, `None` when no access token is stored.
    fn get(&self) -> Option<Credential>;

    /// Overwrite both tokens.
    fn set(&self, credential: Credential);

    /// Remove both tokens and the cached user identity.
    fn clear(&self);

    /// Cached identity of the signed-in user.
    fn user(&self) -> Option<UserIdentity>;

    fn set_user(&self, user: UserIdentity);

    /// Replace the whole session, as done after a login. The cached identity
    /// is dropped when `user` is `None`.
    fn replace(&self, credential: Credential, user: Option<UserIdentity>) {
        self.clear();
        self.set(credential);
        if let Some(user) = user {
            self.set_user(user);
        }
    }

    /// Swap the credential only while the stored refresh token is still
    /// `expected_refresh`; `None` ends the session. Returns whether the swap
    /// happened.
    ///
    /// The default implementation compares and writes in two steps. Stores
    /// shared between threads override it to do both under one write lock.
    fn compare_and_set(&self, expected_refresh: &str, next: Option<Credential>) -> bool {
        if !self
            .get()
            .is_some_and(|c| c.matches_refresh_token(expected_refresh))
        {
            return false;
        }
        match next {
            Some(credential) => self.set(credential),
            None => self.clear(),
        }
        true
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) credential: Option<Credential>,
    pub(crate) user: Option<UserIdentity>,
}

impl SessionState {
    pub(crate) fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    pub(crate) fn clear(&mut self) {
        self.credential = None;
        self.user = None;
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.credential.is_none() && self.user.is_none()
    }

    pub(crate) fn compare_and_set(
        &mut self,
        expected_refresh: &str,
        next: Option<Credential>,
    ) -> bool {
        let current = self
            .credential
            .as_ref()
            .is_some_and(|c| c.matches_refresh_token(expected_refresh));
        if current {
            match next {
                Some(credential) => self.set_credential(credential),
                None => self.clear(),
            }
        }
        current
    }
}

/// On-disk session layout: `token`, `refreshToken`, `user`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) user: Option<Value>,
}

impl From<&SessionState> for SessionRecord {
    fn from(state: &SessionState) -> Self {
        Self {
            token: state
                .credential
                .as_ref()
                .map(|c| c.access_token().to_string()),
            refresh_token: state
                .credential
                .as_ref()
                .and_then(|c| c.refresh_token().map(str::to_string)),
            user: state.user.as_ref().map(|u| u.as_value().clone()),
        }
    }
}

impl From<SessionRecord> for SessionState {
    fn from(record: SessionRecord) -> Self {
        // A refresh token without an access token is not a usable session.
        let credential = record
            .token
            .filter(|t| !t.is_empty())
            .map(|token| Credential::from_parts(token, record.refresh_token));
        Self {
            credential,
            user: record.user.map(UserIdentity::new),
        }
    }
}
