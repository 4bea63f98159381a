//! Service initialization and dependency injection

use std::sync::Arc;

use tracing::info;

use crate::{
    clock::{ReferenceClock, SystemReferenceClock},
    repository::{
        ChatRepository, ContentRepository, PlaybackStateRepository, SessionRepository,
        ViewerRepository,
    },
    service::{ChatService, ContentService, PlaybackService, SessionService, ViewerService},
    transport::SessionHub,
    Config,
};

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    /// Session lifecycle coordination and control gating
    pub sessions: SessionService,
    /// Viewer join/admission/presence
    pub viewers: ViewerService,
    /// Playback state store accept path
    pub playback: PlaybackService,
    /// Session chat
    pub chat: ChatService,
    /// Session content
    pub content: ContentService,
    /// State broadcast hub viewers subscribe to
    pub hub: Arc<SessionHub>,
    /// Reference clock used for authoritative stamping
    pub clock: Arc<dyn ReferenceClock>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish()
    }
}

impl Services {
    /// Initialize all core services against the system reference clock.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemReferenceClock))
    }

    /// Initialize all core services with an explicit reference clock
    /// (tests and simulations).
    #[must_use]
    pub fn with_clock(config: &Config, clock: Arc<dyn ReferenceClock>) -> Self {
        let hub = Arc::new(SessionHub::new(config.session.transport_capacity));

        let session_repo = SessionRepository::new();
        let viewer_repo = ViewerRepository::new();
        let content_repo = ContentRepository::new();
        let chat_repo = ChatRepository::new();
        let playback_repo = PlaybackStateRepository::new();

        let sessions = SessionService::new(
            session_repo,
            viewer_repo.clone(),
            content_repo.clone(),
            chat_repo.clone(),
            playback_repo.clone(),
            hub.clone(),
            clock.clone(),
            config.session.control_policy,
        );
        let playback =
            PlaybackService::new(playback_repo, sessions.clone(), hub.clone(), clock.clone());
        let viewers = ViewerService::new(sessions.clone(), viewer_repo.clone());
        let chat = ChatService::new(
            chat_repo,
            viewer_repo,
            sessions.clone(),
            config.session.max_chat_message_len,
            config.session.chat_history_limit,
        );
        let content = ContentService::new(content_repo, sessions.clone(), playback.clone());

        info!(
            control_policy = ?config.session.control_policy,
            "Core services initialized"
        );

        Self { sessions, viewers, playback, chat, content, hub, clock }
    }
}
