//! Session credentials and token refresh.
//!
//! - [`CredentialStore`] holds the access/refresh token pair and the cached user.
//! - [`RefreshCoordinator`] exchanges the refresh token when the backend rejects
//!   an access token, at most once at a time.
//! - [`SessionEvent`]s announce logins, refreshes and logouts.

mod credential;
pub mod refresh;
mod refresher;
mod session;
pub mod storage;

pub use credential::{Credential, UserIdentity};
pub use refresh::{RefreshCoordinator, RefreshError};
pub use refresher::{HttpTokenRefresher, TokenGrant, TokenRefresher};
pub use session::{LogoutReason, SessionEvent};
pub use storage::{CredentialStore, FileStore, MemoryStore};

pub(crate) use session::SessionEvents;
