//! Single-flight access token refresh.
//!
//! When several requests are rejected with 401/403 at the same time, only the
//! first one performs the refresh call. The others park on a FIFO queue and
//! are released, in arrival order, with the outcome of that single call.
//!
//! ```text
//!   Idle ──401/403──▶ Refreshing ──success──▶ store new token, release queue ──▶ Idle
//!                         │
//!                         └──failure──▶ clear store, reject queue, forced logout ──▶ Idle
//! ```
//!
//! The flag check-and-set and the queue drain each happen inside one critical
//! section that never spans an `.await`, so a second caller can never observe
//! a stale "idle" while a refresh is being started.
//!
//! The outcome is written back only while the store still holds the refresh
//! token that was sent. A login or logout during the call wins, and queued
//! callers are released with whatever session is stored then.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::oneshot;

use super::refresher::{TokenGrant, TokenRefresher};
use super::session::{LogoutReason, SessionEvent, SessionEvents};
use super::storage::CredentialStore;
use super::Credential;

/// Why a refresh did not produce a new access token.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    /// No refresh token was stored; no network call was made.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The refresh endpoint answered with a non-2xx status.
    #[error("refresh rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The refresh call did not complete.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh endpoint answered 2xx with an unusable body.
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The session was cleared while the refresh was in flight.
    #[error("session ended during refresh")]
    SessionEnded,

    /// The refreshing caller was dropped before the refresh settled.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

impl RefreshError {
    /// Whether this failure tears down the session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RefreshError::SessionEnded | RefreshError::Abandoned)
    }
}

type PendingRequest = oneshot::Sender<Result<SecretString, RefreshError>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<PendingRequest>,
}

enum Role {
    Refresher,
    Waiter(oneshot::Receiver<Result<SecretString, RefreshError>>),
    Replay(SecretString),
}

/// Coordinates token refresh for one client.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    events: SessionEvents,
    state: Mutex<RefreshState>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RefreshCoordinator")
            .field("store", &self.store.name())
            .field("refresher", &self.refresher.name())
            .field("refreshing", &state.refreshing)
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl RefreshCoordinator {
    pub(crate) fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        events: SessionEvents,
    ) -> Self {
        Self {
            store,
            refresher,
            events,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Whether a refresh call is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Number of callers parked behind the outstanding refresh.
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Obtain an access token for replaying a request that was rejected while
    /// carrying `rejected_token` (`None` if it was sent unauthenticated).
    ///
    /// If no refresh is running and the store already holds a different access
    /// token, that token is returned without a refresh call: the rejection
    /// raced a refresh that has since completed.
    pub async fn recover(&self, rejected_token: Option<&str>) -> Result<SecretString, RefreshError> {
        match self.enter(rejected_token) {
            Role::Replay(token) => {
                tracing::debug!("Token already rotated, replaying with stored token");
                Ok(token)
            }
            Role::Waiter(rx) => rx.await.unwrap_or(Err(RefreshError::Abandoned)),
            Role::Refresher => {
                let guard = RefresherGuard {
                    coordinator: self,
                    armed: true,
                };
                let Some(refresh_token) = self.stored_refresh_token() else {
                    return guard
                        .disarm()
                        .fail(None, RefreshError::MissingRefreshToken);
                };

                tracing::debug!(refresher = self.refresher.name(), "Refreshing access token");
                let outcome = self.refresher.refresh(refresh_token.expose_secret()).await;

                let coordinator = guard.disarm();
                match outcome {
                    Ok(grant) => coordinator.complete(&refresh_token, grant),
                    Err(error) => coordinator.fail(Some(&refresh_token), error),
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, rejected_token: Option<&str>) -> Role {
        let mut state = self.lock();

        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.queue.push_back(tx);
            tracing::debug!(queued = state.queue.len(), "Refresh in flight, queueing request");
            return Role::Waiter(rx);
        }

        if let Some(current) = self.store.get()
            && rejected_token.is_none_or(|t| !current.matches_access_token(t))
        {
            return Role::Replay(current.access_secret());
        }

        state.refreshing = true;
        Role::Refresher
    }

    fn stored_refresh_token(&self) -> Option<SecretString> {
        self.store
            .get()
            .filter(Credential::has_refresh_token)
            .and_then(|c| c.refresh_token().map(|t| SecretString::from(t.to_string())))
    }

    /// Return to idle and hand `outcome` to every queued caller, in order.
    fn release(&self, outcome: &Result<SecretString, RefreshError>) -> usize {
        let queue = {
            let mut state = self.lock();
            state.refreshing = false;
            std::mem::take(&mut state.queue)
        };

        let released = queue.len();
        for pending in queue {
            // A closed receiver means that caller stopped waiting.
            let _ = pending.send(outcome.clone());
        }
        released
    }

    fn complete(
        &self,
        refresh_token: &SecretString,
        grant: TokenGrant,
    ) -> Result<SecretString, RefreshError> {
        let access_token = grant.access_token.clone();

        // The store holds the new token before anyone is released.
        if !self.store.compare_and_set(
            refresh_token.expose_secret(),
            Some(grant.into_credential(refresh_token)),
        ) {
            return self.superseded();
        }

        let outcome = Ok(access_token);
        let released = self.release(&outcome);
        tracing::info!(released, "Access token refreshed");
        self.events.emit(SessionEvent::Refreshed);

        outcome
    }

    fn fail(
        &self,
        refresh_token: Option<&SecretString>,
        error: RefreshError,
    ) -> Result<SecretString, RefreshError> {
        if !error.is_terminal() {
            let rejected = self.release(&Err(error.clone()));
            tracing::debug!(error = %error, rejected, "Refresh ended without a token");
            return Err(error);
        }

        let cleared = match refresh_token {
            Some(token) => self.store.compare_and_set(token.expose_secret(), None),
            None => {
                let had_session = self.store.get().is_some();
                self.store.clear();
                had_session
            }
        };
        if refresh_token.is_some() && !cleared {
            return self.superseded();
        }

        // Cleared before anyone is released.
        let rejected = self.release(&Err(error.clone()));
        if cleared {
            tracing::warn!(
                error = %error,
                rejected,
                "Token refresh failed, session cleared"
            );
            self.events.emit(SessionEvent::LoggedOut {
                reason: LogoutReason::RefreshFailed(error.to_string()),
            });
        } else {
            // Already logged out; the forced-logout event went out earlier.
            tracing::debug!(error = %error, rejected, "No session left to refresh");
        }

        Err(error)
    }

    /// The session changed while the refresh call was in flight, so its
    /// result no longer applies. Queued callers follow whatever is stored now.
    fn superseded(&self) -> Result<SecretString, RefreshError> {
        let outcome = self
            .store
            .get()
            .map(|current| current.access_secret())
            .ok_or(RefreshError::SessionEnded);
        let released = self.release(&outcome);
        tracing::debug!(
            released,
            session_ended = outcome.is_err(),
            "Session changed during refresh, discarding result"
        );
        outcome
    }
}

/// Releases queued callers if the refreshing future is dropped mid-flight.
struct RefresherGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    armed: bool,
}

impl<'a> RefresherGuard<'a> {
    fn disarm(mut self) -> &'a RefreshCoordinator {
        self.armed = false;
        self.coordinator
    }
}

impl Drop for RefresherGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.coordinator.fail(None, RefreshError::Abandoned);
        }
    }
}
