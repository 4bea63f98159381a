//! Session coordination service
//!
//! Owns the session lifecycle state machine (pending -> active -> ended) and
//! decides which viewers may mutate playback state versus only observe.

use std::sync::Arc;
use tracing::info;

use crate::{
    clock::ReferenceClock,
    models::{ControlPolicy, Session, SessionId, SessionPhase, Viewer, ViewerId},
    repository::{
        ChatRepository, ContentRepository, PlaybackStateRepository, SessionRepository,
        ViewerRepository,
    },
    transport::SessionHub,
    Error, Result,
};

/// Session coordinator
///
/// Top-level state machine per session; gates proposals and chat.
#[derive(Clone)]
pub struct SessionService {
    session_repo: SessionRepository,
    viewer_repo: ViewerRepository,
    content_repo: ContentRepository,
    chat_repo: ChatRepository,
    playback_repo: PlaybackStateRepository,
    hub: Arc<SessionHub>,
    clock: Arc<dyn ReferenceClock>,
    control_policy: ControlPolicy,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("control_policy", &self.control_policy)
            .finish()
    }
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        session_repo: SessionRepository,
        viewer_repo: ViewerRepository,
        content_repo: ContentRepository,
        chat_repo: ChatRepository,
        playback_repo: PlaybackStateRepository,
        hub: Arc<SessionHub>,
        clock: Arc<dyn ReferenceClock>,
        control_policy: ControlPolicy,
    ) -> Self {
        Self {
            session_repo,
            viewer_repo,
            content_repo,
            chat_repo,
            playback_repo,
            hub,
            clock,
            control_policy,
        }
    }

    /// Create a new session.
    ///
    /// The host joins admitted immediately and the playback state is
    /// initialized paused at zero.
    pub async fn create_session(&self, host_id: ViewerId, host_name: String) -> Result<Session> {
        if host_name.is_empty() {
            return Err(Error::InvalidInput("Host name cannot be empty".to_string()));
        }

        let session = self.session_repo.create(Session::new(host_id.clone()))?;

        self.viewer_repo.upsert(Viewer::new(
            session.id.clone(),
            host_id,
            host_name,
            crate::models::AdmissionStatus::Admitted,
        ));
        self.playback_repo.create_or_get(&session.id, self.clock.now());

        info!(
            session_id = %session.id,
            host_id = %session.host_id,
            "Session created"
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session> {
        self.session_repo
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("Session {session_id} not found")))
    }

    /// Check a session ID + PIN pair against a joinable session.
    pub async fn validate_session(&self, session_id: &SessionId, pin: &str) -> Result<Session> {
        let session = self
            .session_repo
            .get_by_id_and_pin(session_id, pin)
            .ok_or_else(|| Error::Authorization("Unknown session ID or wrong PIN".to_string()))?;

        if !session.is_joinable() {
            return Err(Error::InvalidInput("Session has ended".to_string()));
        }
        Ok(session)
    }

    /// Start the session: `Pending -> Active`. Host only, and only once
    /// content is attached.
    pub async fn start_session(&self, session_id: &SessionId, by: &ViewerId) -> Result<Session> {
        let session = self.get_session(session_id).await?;
        if !session.is_host(by) {
            return Err(Error::Authorization("Only the host may start the session".to_string()));
        }
        if self.content_repo.get(session_id).is_none() {
            return Err(Error::InvalidInput(
                "Session has no content to play".to_string(),
            ));
        }

        let session = self.session_repo.set_phase(session_id, SessionPhase::Active)?;
        info!(session_id = %session.id, "Session started");
        Ok(session)
    }

    /// End the session. Host only; also triggered internally when the last
    /// viewer leaves an active session.
    pub async fn end_session(&self, session_id: &SessionId, by: &ViewerId) -> Result<Session> {
        let session = self.get_session(session_id).await?;
        if !session.is_host(by) {
            return Err(Error::Authorization("Only the host may end the session".to_string()));
        }
        self.finish(session_id)
    }

    /// Terminal transition plus teardown of per-session resources. The
    /// session record itself survives as a tombstone so late joins and
    /// validations fail with a meaningful phase, not a lookup miss.
    pub(crate) fn finish(&self, session_id: &SessionId) -> Result<Session> {
        let session = self.session_repo.set_phase(session_id, SessionPhase::Ended)?;

        self.hub.close_session(session_id);
        self.playback_repo.remove(session_id);
        self.viewer_repo.remove_session(session_id);
        self.content_repo.remove_session(session_id);
        self.chat_repo.remove_session(session_id);

        info!(session_id = %session.id, "Session ended");
        Ok(session)
    }

    /// Gate a playback proposal: may `viewer_id` mutate this session's
    /// playback state right now?
    ///
    /// While pending only the host may write; while active the configured
    /// control policy decides; after the end nobody writes.
    pub fn authorize_control(&self, session_id: &SessionId, viewer_id: &ViewerId) -> Result<Session> {
        let session = self
            .session_repo
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("Session {session_id} not found")))?;

        match session.phase {
            SessionPhase::Ended => {
                Err(Error::InvalidInput("Session has ended".to_string()))
            }
            SessionPhase::Pending => {
                if session.is_host(viewer_id) {
                    Ok(session)
                } else {
                    Err(Error::Authorization(
                        "Only the host may control playback before the session starts".to_string(),
                    ))
                }
            }
            SessionPhase::Active => {
                if session.is_host(viewer_id) {
                    return Ok(session);
                }
                match self.control_policy {
                    ControlPolicy::HostOnly => Err(Error::Authorization(
                        "Playback control is restricted to the host".to_string(),
                    )),
                    ControlPolicy::AllAdmitted => {
                        let admitted = self
                            .viewer_repo
                            .get(session_id, viewer_id)
                            .is_some_and(|viewer| viewer.status.is_admitted());
                        if admitted {
                            Ok(session)
                        } else {
                            Err(Error::Authorization(
                                "Viewer is not admitted to this session".to_string(),
                            ))
                        }
                    }
                }
            }
        }
    }

    /// Gate chat: admitted viewers (the host included) while the session is
    /// not ended.
    pub fn authorize_chat(&self, session_id: &SessionId, viewer_id: &ViewerId) -> Result<Session> {
        let session = self
            .session_repo
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("Session {session_id} not found")))?;

        if session.phase.is_ended() {
            return Err(Error::InvalidInput("Session has ended".to_string()));
        }
        if session.is_host(viewer_id) {
            return Ok(session);
        }

        let admitted = self
            .viewer_repo
            .get(session_id, viewer_id)
            .is_some_and(|viewer| viewer.status.is_admitted());
        if admitted {
            Ok(session)
        } else {
            Err(Error::Authorization("Viewer is not admitted to this session".to_string()))
        }
    }
}
