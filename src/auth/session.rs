//! Session lifecycle events.

use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 32;

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogoutReason {
    /// The application called logout.
    UserInitiated,
    /// The refresh token was missing, rejected, or the refresh call failed.
    RefreshFailed(String),
}

/// Observable session transitions.
///
/// `LoggedOut` with [`LogoutReason::RefreshFailed`] is the forced-logout signal:
/// stored credentials are already gone and the application is expected to
/// return to its sign-in entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut { reason: LogoutReason },
}

impl SessionEvent {
    pub fn is_forced_logout(&self) -> bool {
        matches!(
            self,
            SessionEvent::LoggedOut {
                reason: LogoutReason::RefreshFailed(_)
            }
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
