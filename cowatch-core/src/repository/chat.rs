use dashmap::DashMap;
use std::sync::Arc;

use crate::models::{ChatMessage, SessionId};

/// Chat history storage, keyed by session
#[derive(Clone, Default)]
pub struct ChatRepository {
    messages: Arc<DashMap<SessionId, Vec<ChatMessage>>>,
}

impl ChatRepository {
    #[must_use]
    pub fn new() -> Self {
        Self { messages: Arc::new(DashMap::new()) }
    }

    pub fn append(&self, message: ChatMessage) -> ChatMessage {
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message.clone());
        message
    }

    /// Most recent `limit` messages in chronological order.
    #[must_use]
    pub fn recent(&self, session_id: &SessionId, limit: usize) -> Vec<ChatMessage> {
        self.messages
            .get(session_id)
            .map(|history| {
                let skip = history.len().saturating_sub(limit);
                history[skip..].to_vec()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, session_id: &SessionId) -> usize {
        self.messages.get(session_id).map_or(0, |history| history.len())
    }

    pub fn remove_session(&self, session_id: &SessionId) {
        self.messages.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViewerId;

    #[test]
    fn test_recent_returns_tail_in_order() {
        let repo = ChatRepository::new();
        let session_id = SessionId::generate();
        let viewer_id = ViewerId::new();

        for i in 0..5 {
            repo.append(ChatMessage::new(
                session_id.clone(),
                viewer_id.clone(),
                "alice".to_string(),
                format!("message {i}"),
            ));
        }

        let recent = repo.recent(&session_id, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[1].content, "message 4");

        assert_eq!(repo.count(&session_id), 5);
        assert_eq!(repo.recent(&session_id, 100).len(), 5);
        assert!(repo.recent(&SessionId::generate(), 10).is_empty());
    }
}
