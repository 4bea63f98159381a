//! Playback state service
//!
//! The accept path of the playback store: optimistic-concurrency proposals,
//! reference-clock stamping, and broadcast of accepted states.

use std::sync::Arc;
use rand::RngExt;
use tracing::debug;

use crate::{
    clock::ReferenceClock,
    models::{PlaybackProposal, PlaybackState, ProposalOutcome, SessionId, ViewerId},
    repository::PlaybackStateRepository,
    service::SessionService,
    transport::SessionHub,
    Error, Result,
};

/// Playback state management service
///
/// Responsible for serialized state mutation and version-ordered broadcast.
#[derive(Clone)]
pub struct PlaybackService {
    playback_repo: PlaybackStateRepository,
    coordinator: SessionService,
    hub: Arc<SessionHub>,
    clock: Arc<dyn ReferenceClock>,
}

impl std::fmt::Debug for PlaybackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackService").finish()
    }
}

impl PlaybackService {
    /// Maximum retry attempts for the internal reset's CAS loop
    const MAX_RETRIES: u32 = 3;
    /// Base delay for exponential backoff (milliseconds)
    const BACKOFF_BASE_MS: u64 = 5;

    #[must_use]
    pub fn new(
        playback_repo: PlaybackStateRepository,
        coordinator: SessionService,
        hub: Arc<SessionHub>,
        clock: Arc<dyn ReferenceClock>,
    ) -> Self {
        Self { playback_repo, coordinator, hub, clock }
    }

    /// Propose a playback mutation.
    ///
    /// Accepted only when `expected_version` matches the current version for
    /// the session (optimistic concurrency); the accepted state is stamped
    /// with the reference clock, its version incremented by one, and it is
    /// broadcast to subscribers. On a mismatch the caller receives
    /// `Rejected` with the current authoritative state and must re-derive
    /// its proposal before retrying; concurrent proposals are never merged.
    pub async fn propose(
        &self,
        session_id: &SessionId,
        proposer: &ViewerId,
        proposal: PlaybackProposal,
        expected_version: i64,
    ) -> Result<ProposalOutcome> {
        self.coordinator.authorize_control(session_id, proposer)?;

        if !proposal.position_seconds.is_finite() || proposal.position_seconds < 0.0 {
            return Err(Error::InvalidInput(
                "Playback position must be a non-negative number of seconds".to_string(),
            ));
        }

        let current = self.playback_repo.create_or_get(session_id, self.clock.now());
        if current.version != expected_version {
            debug!(
                session_id = %session_id,
                expected_version,
                current_version = current.version,
                "Proposal rejected on version mismatch"
            );
            return Ok(ProposalOutcome::Rejected(current));
        }

        let candidate = PlaybackState {
            session_id: session_id.clone(),
            version: current.version, // assigned by the repository on accept
            is_playing: proposal.is_playing,
            position_seconds: proposal.position_seconds,
            reference_timestamp: self.clock.now(),
            updated_by: proposer.clone(),
        };

        match self.playback_repo.update(candidate, expected_version) {
            Ok(accepted) => {
                self.hub.publish(&accepted);
                debug!(
                    session_id = %session_id,
                    version = accepted.version,
                    is_playing = accepted.is_playing,
                    position = accepted.position_seconds,
                    updated_by = %accepted.updated_by,
                    "Proposal accepted"
                );
                Ok(ProposalOutcome::Accepted(accepted))
            }
            // Lost a race between the read above and the CAS: surface the
            // winner's state exactly like an up-front version mismatch.
            Err(Error::OptimisticLockConflict) => {
                let current = self.playback_repo.get(session_id).ok_or_else(|| {
                    Error::Internal("Playback state vanished during proposal".to_string())
                })?;
                Ok(ProposalOutcome::Rejected(current))
            }
            Err(e) => Err(e),
        }
    }

    /// Current authoritative state. Plain read, no side effects.
    pub async fn get_current(&self, session_id: &SessionId) -> Result<PlaybackState> {
        self.playback_repo
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("No playback state for session {session_id}")))
    }

    /// Reset playback to paused-at-zero as the system (content changed).
    ///
    /// Unlike viewer proposals, this must land regardless of concurrent
    /// writes, so conflicts are retried from fresh state with exponential
    /// backoff plus jitter.
    pub(crate) async fn reset(&self, session_id: &SessionId) -> Result<PlaybackState> {
        for attempt in 0..Self::MAX_RETRIES {
            let current = self.playback_repo.create_or_get(session_id, self.clock.now());
            let candidate = PlaybackState {
                is_playing: false,
                position_seconds: 0.0,
                reference_timestamp: self.clock.now(),
                updated_by: ViewerId::system(),
                ..current.clone()
            };

            match self.playback_repo.update(candidate, current.version) {
                Ok(state) => {
                    self.hub.publish(&state);
                    return Ok(state);
                }
                Err(Error::OptimisticLockConflict) if attempt + 1 < Self::MAX_RETRIES => {
                    // Exponential backoff with jitter: base * 2^attempt + random(0..base)
                    let backoff = Self::BACKOFF_BASE_MS * (1 << attempt);
                    let jitter = rand::rng().random_range(0..Self::BACKOFF_BASE_MS);
                    let delay = backoff + jitter;
                    debug!(
                        session_id = %session_id,
                        attempt = attempt + 1,
                        delay_ms = delay,
                        "Playback reset version conflict, retrying with backoff"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Internal(
            "Playback reset failed after maximum retry attempts".to_string(),
        ))
    }
}
