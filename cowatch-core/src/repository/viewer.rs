use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    models::{AdmissionStatus, ConnectionQuality, SessionId, Viewer, ViewerId},
    Error, Result,
};

/// Viewer roster storage, keyed by session
#[derive(Clone, Default)]
pub struct ViewerRepository {
    rosters: Arc<DashMap<SessionId, Vec<Viewer>>>,
}

impl ViewerRepository {
    #[must_use]
    pub fn new() -> Self {
        Self { rosters: Arc::new(DashMap::new()) }
    }

    /// Insert a viewer, or refresh an existing entry.
    ///
    /// A rejoin keeps the viewer's admission status but refreshes the join
    /// timestamp and resets connection quality.
    pub fn upsert(&self, viewer: Viewer) -> Viewer {
        let mut roster = self.rosters.entry(viewer.session_id.clone()).or_default();

        if let Some(existing) = roster.iter_mut().find(|v| v.viewer_id == viewer.viewer_id) {
            existing.joined_at = Utc::now();
            existing.connection_quality = ConnectionQuality::Good;
            existing.name = viewer.name;
            return existing.clone();
        }

        roster.push(viewer.clone());
        viewer
    }

    #[must_use]
    pub fn get(&self, session_id: &SessionId, viewer_id: &ViewerId) -> Option<Viewer> {
        self.rosters
            .get(session_id)
            .and_then(|roster| roster.iter().find(|v| &v.viewer_id == viewer_id).cloned())
    }

    pub fn set_status(
        &self,
        session_id: &SessionId,
        viewer_id: &ViewerId,
        status: AdmissionStatus,
    ) -> Result<Viewer> {
        self.with_viewer(session_id, viewer_id, |viewer| viewer.status = status)
    }

    pub fn set_connection_quality(
        &self,
        session_id: &SessionId,
        viewer_id: &ViewerId,
        quality: ConnectionQuality,
    ) -> Result<Viewer> {
        self.with_viewer(session_id, viewer_id, |viewer| viewer.connection_quality = quality)
    }

    /// Remove a viewer; returns the removed entry if present.
    pub fn remove(&self, session_id: &SessionId, viewer_id: &ViewerId) -> Option<Viewer> {
        let mut roster = self.rosters.get_mut(session_id)?;
        let index = roster.iter().position(|v| &v.viewer_id == viewer_id)?;
        let removed = roster.remove(index);
        if roster.is_empty() {
            drop(roster);
            self.rosters.remove(session_id);
        }
        Some(removed)
    }

    /// List viewers, optionally filtered by admission status.
    #[must_use]
    pub fn list(&self, session_id: &SessionId, status: Option<AdmissionStatus>) -> Vec<Viewer> {
        self.rosters
            .get(session_id)
            .map(|roster| {
                roster
                    .iter()
                    .filter(|v| status.is_none_or(|s| v.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, session_id: &SessionId) -> usize {
        self.rosters.get(session_id).map_or(0, |roster| roster.len())
    }

    pub fn remove_session(&self, session_id: &SessionId) {
        self.rosters.remove(session_id);
    }

    fn with_viewer(
        &self,
        session_id: &SessionId,
        viewer_id: &ViewerId,
        mutate: impl FnOnce(&mut Viewer),
    ) -> Result<Viewer> {
        let mut roster = self
            .rosters
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("Session {session_id} has no viewers")))?;

        let viewer = roster
            .iter_mut()
            .find(|v| &v.viewer_id == viewer_id)
            .ok_or_else(|| Error::NotFound(format!("Viewer {viewer_id} not in session")))?;

        mutate(viewer);
        Ok(viewer.clone())
    }
}
