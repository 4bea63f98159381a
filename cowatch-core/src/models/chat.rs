use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{SessionId, ViewerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String, // nanoid(12)
    pub session_id: SessionId,
    pub viewer_id: ViewerId,
    pub viewer_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        viewer_id: ViewerId,
        viewer_name: String,
        content: String,
    ) -> Self {
        Self {
            id: super::id::generate_id(),
            session_id,
            viewer_id,
            viewer_name,
            content,
            created_at: Utc::now(),
        }
    }
}
