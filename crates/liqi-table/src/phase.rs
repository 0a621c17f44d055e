//! Session lifecycle.

use std::fmt;

/// Where the client is in a match.
///
/// ```text
/// Unauthenticated → Authenticating ─┬──────────────→ Live → Ended
///                        ↑          └→ Resyncing ──↗   │
///                        └──────── reconnect ──────────┘
/// ```
///
/// Every connection starts by authenticating. A fresh match goes straight
/// to `Live`; a reconnect first replays the archived log in `Resyncing`.
/// A dropped connection in any non-terminal phase goes back to
/// `Authenticating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    Authenticating,
    Resyncing,
    Live,
    Ended,
}

impl SessionPhase {
    pub fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Unauthenticated, Authenticating)
                | (Authenticating, Resyncing | Live | Authenticating)
                | (Resyncing, Live | Authenticating)
                | (Live, Authenticating)
                | (Authenticating | Resyncing | Live, Ended)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Ended
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::Authenticating => "Authenticating",
            Self::Resyncing => "Resyncing",
            Self::Live => "Live",
            Self::Ended => "Ended",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_match_path_is_allowed() {
        let path = [
            SessionPhase::Unauthenticated,
            SessionPhase::Authenticating,
            SessionPhase::Live,
            SessionPhase::Ended,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_reconnect_returns_to_authenticating() {
        assert!(SessionPhase::Live.can_transition_to(SessionPhase::Authenticating));
        assert!(SessionPhase::Resyncing.can_transition_to(SessionPhase::Authenticating));
        assert!(SessionPhase::Authenticating.can_transition_to(SessionPhase::Resyncing));
    }

    #[test]
    fn test_ended_is_terminal() {
        for next in [
            SessionPhase::Unauthenticated,
            SessionPhase::Authenticating,
            SessionPhase::Resyncing,
            SessionPhase::Live,
        ] {
            assert!(!SessionPhase::Ended.can_transition_to(next));
        }
        assert!(SessionPhase::Ended.is_terminal());
    }

    #[test]
    fn test_cannot_skip_authentication() {
        assert!(!SessionPhase::Unauthenticated.can_transition_to(SessionPhase::Live));
        assert!(!SessionPhase::Unauthenticated.can_transition_to(SessionPhase::Resyncing));
        assert!(!SessionPhase::Live.can_transition_to(SessionPhase::Resyncing));
    }
}
