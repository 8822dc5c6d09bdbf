//! Session lifecycle state machine.
//!
//! Single source of truth for session identity and readiness. Pure
//! transition functions over decoded events; no I/O, no channels. The
//! engine applies the returned state; invalid transitions leave the
//! current state untouched.
//!
//! ```text
//! Uninitialized ──connect──▸ Establishing(None) ──session.created──▸ Ready(id)
//!       ▲                                                              │
//!       │  reset (from Error only)          session.updated (idempotent)
//!       └── Terminating ◂──disconnect─── any state
//! ```

/// Lifecycle of the single logical session. Exactly one variant is
/// active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection attempt has been made (or the machine was reset).
    #[default]
    Uninitialized,
    /// Socket open, waiting for the server to acknowledge configuration.
    Establishing { session_id: Option<String> },
    /// Session confirmed; audio and conversation operations permitted.
    Ready { session_id: String },
    /// A fatal error ended the session; leave via [`reset`](Self::reset).
    Error { message: String },
    /// Disconnect in progress; resolves to `Uninitialized` on teardown.
    Terminating,
}

impl SessionState {
    // ── Transitions ───────────────────────────────────────────────

    /// A connect attempt begins establishment.
    pub fn on_connect(&self) -> Self {
        match self {
            Self::Uninitialized => Self::Establishing { session_id: None },
            other => other.clone(),
        }
    }

    /// The server acknowledged session creation with an id.
    pub fn on_session_created(&self, session_id: &str) -> Self {
        match self {
            Self::Establishing { .. } | Self::Ready { .. } => Self::Ready {
                session_id: session_id.to_string(),
            },
            other => other.clone(),
        }
    }

    /// The server confirmed updated configuration. Idempotent in `Ready`;
    /// also completes establishment if `session.updated` arrives first.
    pub fn on_session_updated(&self, session_id: &str) -> Self {
        self.on_session_created(session_id)
    }

    /// A fatal error from any state.
    pub fn on_error(&self, message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }

    /// Disconnect requested from any state.
    pub fn on_disconnect(&self) -> Self {
        Self::Terminating
    }

    /// Teardown finished; the machine returns to `Uninitialized`.
    pub fn finish_termination(&self) -> Self {
        match self {
            Self::Terminating => Self::Uninitialized,
            other => other.clone(),
        }
    }

    /// Explicit reset out of the error state.
    pub fn reset(&self) -> Self {
        match self {
            Self::Error { .. } => Self::Uninitialized,
            other => other.clone(),
        }
    }

    // ── Derived queries ───────────────────────────────────────────

    /// Audio operations are permitted only once the session is ready.
    pub fn can_accept_audio(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Conversation operations are permitted only once the session is ready.
    pub fn can_accept_conversation(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// True once any session id is known.
    pub fn is_established(&self) -> bool {
        match self {
            Self::Ready { .. } => true,
            Self::Establishing { session_id } => session_id.is_some(),
            _ => false,
        }
    }

    /// The session id, if one has been assigned.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Ready { session_id } => Some(session_id),
            Self::Establishing { session_id } => session_id.as_deref(),
            _ => None,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connect_moves_out_of_uninitialized() {
        let state = SessionState::Uninitialized;
        assert_eq!(state.on_session_created("abc"), SessionState::Uninitialized);
        assert_eq!(state.finish_termination(), SessionState::Uninitialized);
        assert_eq!(
            state.on_connect(),
            SessionState::Establishing { session_id: None }
        );
    }

    #[test]
    fn session_created_promotes_establishing_to_ready() {
        let state = SessionState::Establishing { session_id: None };
        assert_eq!(
            state.on_session_created("abc"),
            SessionState::Ready { session_id: "abc".into() }
        );
    }

    #[test]
    fn session_updated_is_idempotent_in_ready() {
        let state = SessionState::Ready { session_id: "abc".into() };
        assert_eq!(
            state.on_session_updated("abc"),
            SessionState::Ready { session_id: "abc".into() }
        );
    }

    #[test]
    fn any_state_reaches_error_on_fatal_event() {
        let states = [
            SessionState::Uninitialized,
            SessionState::Establishing { session_id: None },
            SessionState::Ready { session_id: "abc".into() },
            SessionState::Terminating,
        ];
        for state in states {
            assert_eq!(
                state.on_error("boom"),
                SessionState::Error { message: "boom".into() }
            );
        }
    }

    #[test]
    fn disconnect_reaches_uninitialized_via_terminating() {
        let state = SessionState::Ready { session_id: "abc".into() };
        let terminating = state.on_disconnect();
        assert_eq!(terminating, SessionState::Terminating);
        assert_eq!(terminating.finish_termination(), SessionState::Uninitialized);
    }

    #[test]
    fn error_leaves_only_via_reset() {
        let state = SessionState::Error { message: "boom".into() };
        assert_eq!(state.on_connect(), state);
        assert_eq!(state.on_session_created("abc"), state);
        assert_eq!(state.reset(), SessionState::Uninitialized);
    }

    #[test]
    fn readiness_queries_track_state() {
        let ready = SessionState::Ready { session_id: "abc".into() };
        assert!(ready.can_accept_audio());
        assert!(ready.can_accept_conversation());
        assert!(ready.is_established());
        assert_eq!(ready.session_id(), Some("abc"));

        let establishing = SessionState::Establishing { session_id: Some("abc".into()) };
        assert!(!establishing.can_accept_audio());
        assert!(establishing.is_established());
        assert_eq!(establishing.session_id(), Some("abc"));

        let fresh = SessionState::Establishing { session_id: None };
        assert!(!fresh.is_established());
        assert_eq!(fresh.session_id(), None);
    }
}
