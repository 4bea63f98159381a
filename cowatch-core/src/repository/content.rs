use dashmap::DashMap;
use std::sync::Arc;

use crate::models::{SessionContent, SessionId};

/// Session content storage: at most one record per session
#[derive(Clone, Default)]
pub struct ContentRepository {
    contents: Arc<DashMap<SessionId, SessionContent>>,
}

impl ContentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self { contents: Arc::new(DashMap::new()) }
    }

    /// Set a session's content, replacing any previous record.
    /// Returns the replaced record, if there was one.
    pub fn replace(&self, content: SessionContent) -> Option<SessionContent> {
        self.contents.insert(content.session_id.clone(), content)
    }

    #[must_use]
    pub fn get(&self, session_id: &SessionId) -> Option<SessionContent> {
        self.contents.get(session_id).map(|entry| entry.clone())
    }

    pub fn remove_session(&self, session_id: &SessionId) {
        self.contents.remove(session_id);
    }
}
