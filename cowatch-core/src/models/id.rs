use nanoid::nanoid;
use serde::{Deserialize, Serialize};

/// Generate a 12-character nanoid for entity IDs
pub fn generate_id() -> String {
    nanoid!(12)
}

/// Alphabet for the human-readable part of session IDs (no lowercase,
/// easy to read out over a call).
const SESSION_ALPHABET: [char; 36] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Prefix for all session IDs
pub const SESSION_ID_PREFIX: &str = "MOVIE-";

/// Session ID type (`MOVIE-` + 6 uppercase alphanumerics)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{}{}", SESSION_ID_PREFIX, nanoid!(6, &SESSION_ALPHABET)))
    }

    #[must_use]
    pub const fn from_string(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Viewer ID type.
///
/// Issued by the external identity provider; treated as an opaque string.
/// `new()` generates one locally for anonymous viewers and tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(pub String);

impl ViewerId {
    #[must_use]
    pub fn new() -> Self {
        Self(generate_id())
    }

    /// Well-known ID for writes performed by the system itself
    /// (e.g. the playback reset when content changes).
    #[must_use]
    pub fn system() -> Self {
        Self("system".to_string())
    }

    #[must_use]
    pub const fn from_string(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ViewerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id();
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn test_session_id_format() {
        let id = SessionId::generate();
        assert!(id.as_str().starts_with(SESSION_ID_PREFIX));
        assert_eq!(id.as_str().len(), SESSION_ID_PREFIX.len() + 6);
        assert!(id
            .as_str()
            .trim_start_matches(SESSION_ID_PREFIX)
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_session_ids_unique() {
        let id1 = SessionId::generate();
        let id2 = SessionId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_viewer_id() {
        let id1 = ViewerId::new();
        let id2 = ViewerId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 12);
        assert_eq!(ViewerId::system().as_str(), "system");
    }
}
