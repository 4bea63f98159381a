use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    models::{PlaybackState, SessionId},
    Error, Result,
};

/// Versioned playback state storage with optimistic concurrency.
///
/// The version check and increment happen atomically under the per-session
/// map entry, so no two updates for one session are ever accepted
/// concurrently; sessions are independent and proceed in parallel. Durable
/// persistence, if any, belongs to the external backing service and is not
/// this layer's concern.
#[derive(Clone, Default)]
pub struct PlaybackStateRepository {
    states: Arc<DashMap<SessionId, PlaybackState>>,
}

impl PlaybackStateRepository {
    #[must_use]
    pub fn new() -> Self {
        Self { states: Arc::new(DashMap::new()) }
    }

    /// Get playback state
    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<PlaybackState> {
        self.states.get(session_id).map(|entry| entry.clone())
    }

    /// Create playback state for a session if absent, returning the stored state
    pub fn create_or_get(
        &self,
        session_id: &SessionId,
        reference_timestamp: DateTime<Utc>,
    ) -> PlaybackState {
        self.states
            .entry(session_id.clone())
            .or_insert_with(|| PlaybackState::new(session_id.clone(), reference_timestamp))
            .clone()
    }

    /// Update playback state with optimistic locking.
    ///
    /// Succeeds only when `expected_version` matches the stored version; the
    /// stored version then becomes `expected_version + 1`. On conflict the
    /// store is left untouched and `Error::OptimisticLockConflict` is
    /// returned.
    pub fn update(&self, state: PlaybackState, expected_version: i64) -> Result<PlaybackState> {
        let mut entry = self
            .states
            .get_mut(&state.session_id)
            .ok_or_else(|| Error::NotFound("Playback state not found".to_string()))?;

        if entry.version != expected_version {
            return Err(Error::OptimisticLockConflict);
        }

        *entry = PlaybackState { version: expected_version + 1, ..state };
        Ok(entry.clone())
    }

    /// Drop a session's state (session teardown)
    pub fn remove(&self, session_id: &SessionId) {
        self.states.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaybackProposal, ViewerId};

    /// Seed the repository and build a state carrying the proposal's fields.
    fn proposal_state(
        repo: &PlaybackStateRepository,
        session_id: &SessionId,
        proposal: PlaybackProposal,
    ) -> PlaybackState {
        repo.create_or_get(session_id, Utc::now());
        PlaybackState {
            session_id: session_id.clone(),
            version: 0, // overwritten by update()
            is_playing: proposal.is_playing,
            position_seconds: proposal.position_seconds,
            reference_timestamp: Utc::now(),
            updated_by: ViewerId::new(),
        }
    }

    #[test]
    fn test_create_or_get_is_idempotent() {
        let repo = PlaybackStateRepository::new();
        let session_id = SessionId::generate();
        let t = Utc::now();

        let first = repo.create_or_get(&session_id, t);
        let second = repo.create_or_get(&session_id, t + chrono::TimeDelta::seconds(10));

        assert_eq!(first.version, 0);
        assert_eq!(second.version, 0);
        assert_eq!(second.reference_timestamp, t);
    }

    #[test]
    fn test_update_increments_version_by_one() {
        let repo = PlaybackStateRepository::new();
        let session_id = SessionId::generate();
        let state = proposal_state(&repo, &session_id, PlaybackProposal::play(0.0));

        let v1 = repo.update(state.clone(), 0).expect("first update");
        assert_eq!(v1.version, 1);

        let v2 = repo.update(state, 1).expect("second update");
        assert_eq!(v2.version, 2);
    }

    #[test]
    fn test_stale_version_never_mutates() {
        let repo = PlaybackStateRepository::new();
        let session_id = SessionId::generate();
        let state = proposal_state(&repo, &session_id, PlaybackProposal::play(10.0));

        repo.update(state.clone(), 0).expect("initial update");

        let stale = PlaybackState { position_seconds: 99.0, ..state };
        let err = repo.update(stale, 0).expect_err("stale version must be rejected");
        assert!(matches!(err, Error::OptimisticLockConflict));

        let current = repo.get(&session_id).expect("state exists");
        assert_eq!(current.version, 1);
        assert!((current.position_seconds - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_unknown_session() {
        let repo = PlaybackStateRepository::new();
        let state = PlaybackState::new(SessionId::generate(), Utc::now());
        assert!(matches!(repo.update(state, 0), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_updates_accept_exactly_one_per_version() {
        let repo = PlaybackStateRepository::new();
        let session_id = SessionId::generate();
        repo.create_or_get(&session_id, Utc::now());

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            let session_id = session_id.clone();
            handles.push(tokio::spawn(async move {
                let state = PlaybackState {
                    session_id: session_id.clone(),
                    version: 0,
                    is_playing: true,
                    position_seconds: f64::from(i),
                    reference_timestamp: Utc::now(),
                    updated_by: ViewerId::new(),
                };
                repo.update(state, 0).is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.expect("task join") {
                accepted += 1;
            }
        }

        // Exactly one proposal wins version 1; every other one conflicts.
        assert_eq!(accepted, 1);
        assert_eq!(repo.get(&session_id).expect("state").version, 1);
    }
}
