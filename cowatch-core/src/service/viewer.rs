//! Viewer lifecycle service
//!
//! Join/admission/presence handling. Admission gates chat and playback
//! control but never observation: a pending viewer still receives state
//! broadcasts.

use tracing::info;

use crate::{
    models::{AdmissionStatus, ConnectionQuality, SessionId, Viewer, ViewerId},
    repository::ViewerRepository,
    service::SessionService,
    Error, Result,
};

#[derive(Clone)]
pub struct ViewerService {
    coordinator: SessionService,
    viewer_repo: ViewerRepository,
}

impl std::fmt::Debug for ViewerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerService").finish()
    }
}

impl ViewerService {
    #[must_use]
    pub const fn new(coordinator: SessionService, viewer_repo: ViewerRepository) -> Self {
        Self { coordinator, viewer_repo }
    }

    /// Join a session with its ID + PIN credential pair.
    ///
    /// The host is admitted automatically; everyone else waits for the
    /// host's decision. Rejoining refreshes the existing roster entry
    /// instead of duplicating it.
    pub async fn join(
        &self,
        session_id: &SessionId,
        pin: &str,
        viewer_id: ViewerId,
        name: String,
    ) -> Result<Viewer> {
        if name.is_empty() {
            return Err(Error::InvalidInput("Viewer name cannot be empty".to_string()));
        }

        let session = self.coordinator.validate_session(session_id, pin).await?;
        let status = if session.is_host(&viewer_id) {
            AdmissionStatus::Admitted
        } else {
            AdmissionStatus::Pending
        };

        let viewer =
            self.viewer_repo
                .upsert(Viewer::new(session.id.clone(), viewer_id, name, status));

        info!(
            session_id = %session.id,
            viewer_id = %viewer.viewer_id,
            status = %viewer.status,
            "Viewer joined"
        );
        Ok(viewer)
    }

    /// Admit a pending viewer. Host only.
    pub async fn admit(
        &self,
        session_id: &SessionId,
        host: &ViewerId,
        viewer_id: &ViewerId,
    ) -> Result<Viewer> {
        self.decide(session_id, host, viewer_id, AdmissionStatus::Admitted).await
    }

    /// Reject a pending viewer. Host only. The viewer may keep observing.
    pub async fn reject(
        &self,
        session_id: &SessionId,
        host: &ViewerId,
        viewer_id: &ViewerId,
    ) -> Result<Viewer> {
        self.decide(session_id, host, viewer_id, AdmissionStatus::Rejected).await
    }

    async fn decide(
        &self,
        session_id: &SessionId,
        host: &ViewerId,
        viewer_id: &ViewerId,
        status: AdmissionStatus,
    ) -> Result<Viewer> {
        let session = self.coordinator.get_session(session_id).await?;
        if !session.is_host(host) {
            return Err(Error::Authorization("Only the host may decide admission".to_string()));
        }
        if session.phase.is_ended() {
            return Err(Error::InvalidInput("Session has ended".to_string()));
        }

        let viewer = self.viewer_repo.set_status(session_id, viewer_id, status)?;
        info!(
            session_id = %session_id,
            viewer_id = %viewer_id,
            status = %status,
            "Admission decided"
        );
        Ok(viewer)
    }

    /// Self-reported connection quality, surfaced in the viewer list.
    pub async fn set_connection_quality(
        &self,
        session_id: &SessionId,
        viewer_id: &ViewerId,
        quality: ConnectionQuality,
    ) -> Result<Viewer> {
        self.viewer_repo.set_connection_quality(session_id, viewer_id, quality)
    }

    /// Leave a session. The last viewer leaving an active session ends it.
    ///
    /// Idempotent: leaving a session one is not in, or one already ended,
    /// is not an error.
    pub async fn leave(&self, session_id: &SessionId, viewer_id: &ViewerId) -> Result<()> {
        if self.viewer_repo.remove(session_id, viewer_id).is_none() {
            return Ok(());
        }

        info!(session_id = %session_id, viewer_id = %viewer_id, "Viewer left");

        let Ok(session) = self.coordinator.get_session(session_id).await else {
            return Ok(());
        };
        if session.phase.is_active() && self.viewer_repo.count(session_id) == 0 {
            self.coordinator.finish(session_id)?;
            info!(session_id = %session_id, "Last viewer left, session ended");
        }
        Ok(())
    }

    /// List viewers, optionally filtered by admission status.
    pub async fn list(
        &self,
        session_id: &SessionId,
        status: Option<AdmissionStatus>,
    ) -> Result<Vec<Viewer>> {
        self.coordinator.get_session(session_id).await?;
        Ok(self.viewer_repo.list(session_id, status))
    }
}
