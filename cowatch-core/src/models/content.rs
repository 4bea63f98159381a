use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::SessionId;

/// Where a session's video comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Direct URL to a stream or file
    Url,
    /// File uploaded through the external storage service
    Upload,
}

impl ContentKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Upload => "upload",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single content record of a session.
///
/// Setting new content replaces the previous record and resets playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContent {
    pub session_id: SessionId,
    pub kind: ContentKind,
    pub source: String,
    pub title: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl SessionContent {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        kind: ContentKind,
        source: String,
        title: Option<String>,
    ) -> Self {
        Self { session_id, kind, source, title, added_at: Utc::now() }
    }
}
