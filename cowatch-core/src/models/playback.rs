use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{SessionId, ViewerId};

/// Authoritative playback state for a session.
///
/// `position_seconds` is the playback position at the instant
/// `reference_timestamp` was recorded on the reference clock; consumers
/// project it forward with [`PlaybackState::expected_position`]. `version`
/// increases by exactly one on every accepted proposal and is the optimistic
/// concurrency token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackState {
    pub session_id: SessionId,
    pub version: i64,
    pub is_playing: bool,
    pub position_seconds: f64,
    pub reference_timestamp: DateTime<Utc>,
    pub updated_by: ViewerId,
}

impl PlaybackState {
    #[must_use]
    pub fn new(session_id: SessionId, reference_timestamp: DateTime<Utc>) -> Self {
        Self {
            session_id,
            version: 0,
            is_playing: false,
            position_seconds: 0.0,
            reference_timestamp,
            updated_by: ViewerId::system(),
        }
    }

    /// Project the position this state implies at `now_reference`.
    ///
    /// While playing, position advances with reference time; while paused it
    /// holds. Never returns a negative position.
    #[must_use]
    pub fn expected_position(&self, now_reference: DateTime<Utc>) -> f64 {
        if self.is_playing {
            let elapsed =
                (now_reference - self.reference_timestamp).num_milliseconds() as f64 / 1000.0;
            (self.position_seconds + elapsed).max(0.0)
        } else {
            self.position_seconds
        }
    }
}

/// What a viewer asks the store to make true.
///
/// The reference timestamp and version are assigned by the store on
/// acceptance, never by the proposer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlaybackProposal {
    pub is_playing: bool,
    pub position_seconds: f64,
}

impl PlaybackProposal {
    #[must_use]
    pub const fn play(position_seconds: f64) -> Self {
        Self { is_playing: true, position_seconds }
    }

    #[must_use]
    pub const fn pause(position_seconds: f64) -> Self {
        Self { is_playing: false, position_seconds }
    }
}

/// Outcome of a playback proposal.
///
/// Rejection is a normal protocol outcome, not an error: the caller gets the
/// current authoritative state and must re-derive its proposal before
/// retrying. The store never merges concurrent proposals.
#[derive(Debug, Clone)]
pub enum ProposalOutcome {
    Accepted(PlaybackState),
    Rejected(PlaybackState),
}

impl ProposalOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The state carried by either outcome: the new authoritative state on
    /// accept, the current authoritative state on reject.
    #[must_use]
    pub const fn state(&self) -> &PlaybackState {
        match self {
            Self::Accepted(state) | Self::Rejected(state) => state,
        }
    }

    #[must_use]
    pub fn into_state(self) -> PlaybackState {
        match self {
            Self::Accepted(state) | Self::Rejected(state) => state,
        }
    }
}
