use crate::error::{AppError, AppResult};
use serde::Serialize;

/// Lifecycle of one connection.
///
/// ```text
/// Connecting --submit-name--> Named --join-private-room--> Active
///      \                        \                            |
///       `------------------------`------ disconnect ---------`--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Named,
    Active,
    Disconnected,
}

impl SessionState {
    pub fn on_submit_name(self) -> AppResult<Self> {
        match self {
            SessionState::Connecting | SessionState::Named => Ok(SessionState::Named),
            SessionState::Active => Ok(SessionState::Active),
            SessionState::Disconnected => Err(self.reject("submit-name")),
        }
    }

    pub fn on_join_room(self) -> AppResult<Self> {
        match self {
            SessionState::Named | SessionState::Active => Ok(SessionState::Active),
            SessionState::Connecting | SessionState::Disconnected => {
                Err(self.reject("join-private-room"))
            }
        }
    }

    pub fn on_disconnect(self) -> Self {
        SessionState::Disconnected
    }

    /// Named sessions are the ones visible in presence and allowed to send.
    pub fn is_named(&self) -> bool {
        matches!(self, SessionState::Named | SessionState::Active)
    }

    fn reject(self, event: &'static str) -> AppError {
        AppError::InvalidTransition { from: self, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_name_names_the_session() {
        assert_eq!(
            SessionState::Connecting.on_submit_name().unwrap(),
            SessionState::Named
        );
        assert_eq!(SessionState::Named.on_submit_name().unwrap(), SessionState::Named);
        // Renaming keeps an open private room.
        assert_eq!(
            SessionState::Active.on_submit_name().unwrap(),
            SessionState::Active
        );
    }

    #[test]
    fn join_requires_a_name() {
        assert!(matches!(
            SessionState::Connecting.on_join_room(),
            Err(AppError::InvalidTransition {
                from: SessionState::Connecting,
                event: "join-private-room"
            })
        ));
        assert_eq!(SessionState::Named.on_join_room().unwrap(), SessionState::Active);
        assert_eq!(SessionState::Active.on_join_room().unwrap(), SessionState::Active);
    }

    #[test]
    fn disconnected_is_terminal() {
        for state in [
            SessionState::Connecting,
            SessionState::Named,
            SessionState::Active,
            SessionState::Disconnected,
        ] {
            assert_eq!(state.on_disconnect(), SessionState::Disconnected);
        }
        assert!(SessionState::Disconnected.on_submit_name().is_err());
        assert!(SessionState::Disconnected.on_join_room().is_err());
    }

    #[test]
    fn only_named_states_are_visible() {
        assert!(!SessionState::Connecting.is_named());
        assert!(SessionState::Named.is_named());
        assert!(SessionState::Active.is_named());
        assert!(!SessionState::Disconnected.is_named());
    }
}
