//! Shared session state.
//!
//! Holds the single authoritative session value observed by the rest of the
//! application. Mutated exclusively by the session facade; any number of
//! readers subscribe for change notifications or take point-in-time
//! snapshots.

use tokio::sync::watch;

use crate::models::Session;

/// Whether bootstrap has finished. `Initializing` only ever transitions to
/// `Ready`, never back, within one process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Initializing,
    Ready,
}

/// An immutable snapshot of the session state: the current session, the
/// bootstrap status, and the most recent operation error (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session: Session,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    fn initializing() -> Self {
        SessionSnapshot {
            status: SessionStatus::Initializing,
            session: Session::anonymous(),
            last_error: None,
        }
    }
}

/// The process-wide session cell, created once at application start.
///
/// Built on a `watch` channel: the latest snapshot always wins, which is
/// exactly the tie-break the session manager needs (a push notification
/// published after an operation's result overwrites it).
pub struct SharedSessionState {
    tx: watch::Sender<SessionSnapshot>,
}

impl SharedSessionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::initializing());
        SharedSessionState { tx }
    }

    /// The current snapshot.
    pub fn current(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.tx.borrow().session.clone()
    }

    /// Register an observer. The receiver yields a change notification for
    /// every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Publish a new session value and clear the last error. Marks the state
    /// `Ready`: every session publish happens at or after the end of
    /// bootstrap.
    pub(crate) fn publish_session(&self, session: Session) {
        self.tx.send_replace(SessionSnapshot {
            status: SessionStatus::Ready,
            session,
            last_error: None,
        });
    }

    /// Record an operation failure. The session itself is left untouched.
    pub(crate) fn publish_error(&self, message: String) {
        self.tx.send_modify(|snapshot| {
            snapshot.last_error = Some(message);
        });
    }

    /// Clear the recorded error after an operation that succeeded without
    /// changing the session.
    pub(crate) fn clear_error(&self) {
        self.tx.send_modify(|snapshot| {
            snapshot.last_error = None;
        });
    }
}

impl Default for SharedSessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Identity, IdentitySource, Session};

    fn identity() -> Identity {
        Identity::new(
            "id-1".to_string(),
            "a@x.com".to_string(),
            "Ann".to_string(),
            IdentitySource::Email,
        )
    }

    /// The state starts out initializing and anonymous.
    #[test]
    fn test_starts_initializing() {
        let state = SharedSessionState::new();
        let snapshot = state.current();
        assert_eq!(snapshot.status, SessionStatus::Initializing);
        assert!(!snapshot.session.is_authenticated());
        assert!(snapshot.last_error.is_none());
    }

    /// Publishing a session marks the state ready; it never reverts.
    #[test]
    fn test_ready_is_terminal() {
        let state = SharedSessionState::new();
        state.publish_session(Session::anonymous());
        assert_eq!(state.current().status, SessionStatus::Ready);
        state.publish_error("boom".to_string());
        assert_eq!(state.current().status, SessionStatus::Ready);
        state.publish_session(Session::authenticated(identity()));
        assert_eq!(state.current().status, SessionStatus::Ready);
    }

    /// An error keeps the session but records the message; the next
    /// successful publish clears it.
    #[test]
    fn test_error_leaves_session_untouched() {
        let state = SharedSessionState::new();
        state.publish_session(Session::authenticated(identity()));
        state.publish_error("rejected".to_string());

        let snapshot = state.current();
        assert!(snapshot.session.is_authenticated());
        assert_eq!(snapshot.last_error.as_deref(), Some("rejected"));

        state.publish_session(Session::anonymous());
        assert!(state.current().last_error.is_none());
    }

    /// Subscribers observe the latest published snapshot.
    #[tokio::test]
    async fn test_subscribers_see_latest_value() {
        let state = SharedSessionState::new();
        let mut rx = state.subscribe();

        state.publish_session(Session::authenticated(identity()));
        rx.changed().await.expect("sender alive");
        assert!(rx.borrow().session.is_authenticated());

        state.publish_session(Session::anonymous());
        rx.changed().await.expect("sender alive");
        assert!(!rx.borrow().session.is_authenticated());
    }
}
