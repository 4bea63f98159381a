//! Session content service
//!
//! A session plays exactly one piece of content at a time; attaching new
//! content replaces the old record and resets playback to paused-at-zero.

use tracing::info;

use crate::{
    models::{ContentKind, SessionContent, SessionId, ViewerId},
    repository::ContentRepository,
    service::{PlaybackService, SessionService},
    Error, Result,
};

#[derive(Clone)]
pub struct ContentService {
    content_repo: ContentRepository,
    coordinator: SessionService,
    playback: PlaybackService,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService").finish()
    }
}

impl ContentService {
    #[must_use]
    pub const fn new(
        content_repo: ContentRepository,
        coordinator: SessionService,
        playback: PlaybackService,
    ) -> Self {
        Self { content_repo, coordinator, playback }
    }

    /// Attach content to a session. Host only.
    ///
    /// Replaces any previous content and resets the playback state so every
    /// viewer reconverges from position zero.
    pub async fn set_content(
        &self,
        session_id: &SessionId,
        by: &ViewerId,
        kind: ContentKind,
        source: String,
        title: Option<String>,
    ) -> Result<SessionContent> {
        let session = self.coordinator.get_session(session_id).await?;
        if !session.is_host(by) {
            return Err(Error::Authorization("Only the host may set content".to_string()));
        }
        if session.phase.is_ended() {
            return Err(Error::InvalidInput("Session has ended".to_string()));
        }
        if source.is_empty() {
            return Err(Error::InvalidInput("Content source cannot be empty".to_string()));
        }
        if kind == ContentKind::Url {
            url::Url::parse(&source)
                .map_err(|e| Error::InvalidInput(format!("Content source is not a valid URL: {e}")))?;
        }

        let content = SessionContent::new(session.id.clone(), kind, source, title);
        let replaced = self.content_repo.replace(content.clone()).is_some();

        self.playback.reset(session_id).await?;

        info!(
            session_id = %session_id,
            kind = %content.kind,
            replaced,
            "Session content set"
        );
        Ok(content)
    }

    /// The session's current content, if any has been attached.
    pub async fn get_content(&self, session_id: &SessionId) -> Result<Option<SessionContent>> {
        self.coordinator.get_session(session_id).await?;
        Ok(self.content_repo.get(session_id))
    }
}
