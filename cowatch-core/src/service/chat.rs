//! Chat service
//!
//! Persists session chat; delivery to other viewers is the backing
//! service's concern, as is long-term retention.

use tracing::debug;

use crate::{
    models::{ChatMessage, SessionId, ViewerId},
    repository::{ChatRepository, ViewerRepository},
    service::SessionService,
    Error, Result,
};

#[derive(Clone)]
pub struct ChatService {
    chat_repo: ChatRepository,
    viewer_repo: ViewerRepository,
    coordinator: SessionService,
    max_message_len: usize,
    history_limit: usize,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService").finish()
    }
}

impl ChatService {
    #[must_use]
    pub const fn new(
        chat_repo: ChatRepository,
        viewer_repo: ViewerRepository,
        coordinator: SessionService,
        max_message_len: usize,
        history_limit: usize,
    ) -> Self {
        Self { chat_repo, viewer_repo, coordinator, max_message_len, history_limit }
    }

    /// Send a chat message. Admitted viewers only.
    pub async fn send_message(
        &self,
        session_id: &SessionId,
        viewer_id: &ViewerId,
        content: String,
    ) -> Result<ChatMessage> {
        self.coordinator.authorize_chat(session_id, viewer_id)?;

        if content.trim().is_empty() {
            return Err(Error::InvalidInput("Message content cannot be empty".to_string()));
        }
        if content.chars().count() > self.max_message_len {
            return Err(Error::InvalidInput(format!(
                "Message content must be at most {} characters",
                self.max_message_len
            )));
        }

        let viewer_name = self
            .viewer_repo
            .get(session_id, viewer_id)
            .map_or_else(|| viewer_id.to_string(), |viewer| viewer.name);

        let message = self.chat_repo.append(ChatMessage::new(
            session_id.clone(),
            viewer_id.clone(),
            viewer_name,
            content,
        ));

        debug!(
            session_id = %session_id,
            viewer_id = %viewer_id,
            message_id = %message.id,
            "Chat message sent"
        );
        Ok(message)
    }

    /// Most recent messages in chronological order.
    pub async fn recent(
        &self,
        session_id: &SessionId,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>> {
        self.coordinator.get_session(session_id).await?;
        Ok(self.chat_repo.recent(session_id, limit.unwrap_or(self.history_limit)))
    }
}
