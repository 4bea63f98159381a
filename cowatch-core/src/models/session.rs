use chrono::{DateTime, Utc};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{SessionId, ViewerId};

/// Session lifecycle phase.
///
/// Transitions are one-directional: `Pending -> Active -> Ended`. No phase
/// is re-enterable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum SessionPhase {
    #[default]
    Pending,
    Active,
    Ended,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Whether the one-directional lifecycle permits moving to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active) | (Self::Pending | Self::Active, Self::Ended)
        )
    }
}

impl FromStr for SessionPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            _ => Err(format!("Unknown session phase: {s}")),
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who may mutate playback state while a session is `Active`.
///
/// While `Pending` the host is always the only writer, regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum ControlPolicy {
    /// Only the host may play/pause/seek.
    HostOnly,
    /// Any admitted viewer may play/pause/seek.
    #[default]
    AllAdmitted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub pin: String,
    pub host_id: ViewerId,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(host_id: ViewerId) -> Self {
        Self {
            id: SessionId::generate(),
            pin: generate_pin(),
            host_id,
            phase: SessionPhase::Pending,
            created_at: Utc::now(),
        }
    }

    /// Viewers may join while pending or active, never after the end.
    #[must_use]
    pub const fn is_joinable(&self) -> bool {
        matches!(self.phase, SessionPhase::Pending | SessionPhase::Active)
    }

    #[must_use]
    pub fn is_host(&self, viewer_id: &ViewerId) -> bool {
        &self.host_id == viewer_id
    }
}

/// Generate a 4-digit numeric PIN (1000..=9999)
#[must_use]
pub fn generate_pin() -> String {
    rand::rng().random_range(1000..10000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions_one_directional() {
        use SessionPhase::{Active, Ended, Pending};

        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Ended));
        assert!(Active.can_transition_to(Ended));

        assert!(!Active.can_transition_to(Pending));
        assert!(!Ended.can_transition_to(Pending));
        assert!(!Ended.can_transition_to(Active));
        assert!(!Ended.can_transition_to(Ended));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_phase_round_trip() {
        for phase in [SessionPhase::Pending, SessionPhase::Active, SessionPhase::Ended] {
            assert_eq!(phase.as_str().parse::<SessionPhase>(), Ok(phase));
        }
        assert!("closed".parse::<SessionPhase>().is_err());
    }

    #[test]
    fn test_generate_pin() {
        for _ in 0..100 {
            let pin = generate_pin();
            assert_eq!(pin.len(), 4);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_new_session() {
        let host = ViewerId::new();
        let session = Session::new(host.clone());
        assert_eq!(session.phase, SessionPhase::Pending);
        assert!(session.is_joinable());
        assert!(session.is_host(&host));
        assert!(!session.is_host(&ViewerId::new()));
    }
}
