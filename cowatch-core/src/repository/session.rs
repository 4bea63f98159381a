use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    models::{Session, SessionId, SessionPhase},
    Error, Result,
};

/// Session record storage
#[derive(Clone, Default)]
pub struct SessionRepository {
    sessions: Arc<DashMap<SessionId, Session>>,
}

impl SessionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self { sessions: Arc::new(DashMap::new()) }
    }

    pub fn create(&self, session: Session) -> Result<Session> {
        match self.sessions.entry(session.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(Error::AlreadyExists(format!("Session {} already exists", session.id)))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(session.clone());
                Ok(session)
            }
        }
    }

    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    /// Look up a session by ID and PIN, the join credential pair.
    #[must_use]
    pub fn get_by_id_and_pin(&self, session_id: &SessionId, pin: &str) -> Option<Session> {
        self.sessions
            .get(session_id)
            .filter(|entry| entry.pin == pin)
            .map(|entry| entry.clone())
    }

    /// Move a session to `phase`, enforcing the one-directional lifecycle.
    pub fn set_phase(&self, session_id: &SessionId, phase: SessionPhase) -> Result<Session> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("Session {session_id} not found")))?;

        if !entry.phase.can_transition_to(phase) {
            return Err(Error::InvalidInput(format!(
                "Session cannot move from {} to {}",
                entry.phase, phase
            )));
        }

        entry.phase = phase;
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViewerId;

    #[test]
    fn test_create_and_lookup() {
        let repo = SessionRepository::new();
        let session = repo.create(Session::new(ViewerId::new())).expect("create");

        assert!(repo.get(&session.id).is_some());
        assert!(repo.get_by_id_and_pin(&session.id, &session.pin).is_some());
        assert!(repo.get_by_id_and_pin(&session.id, "0000").is_none() || session.pin == "0000");
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let repo = SessionRepository::new();
        let session = repo.create(Session::new(ViewerId::new())).expect("create");
        assert!(matches!(repo.create(session), Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_set_phase_enforces_lifecycle() {
        let repo = SessionRepository::new();
        let session = repo.create(Session::new(ViewerId::new())).expect("create");

        let active = repo.set_phase(&session.id, SessionPhase::Active).expect("activate");
        assert!(active.phase.is_active());

        // No way back
        assert!(repo.set_phase(&session.id, SessionPhase::Pending).is_err());

        let ended = repo.set_phase(&session.id, SessionPhase::Ended).expect("end");
        assert!(ended.phase.is_ended());
        assert!(repo.set_phase(&session.id, SessionPhase::Active).is_err());
    }
}
