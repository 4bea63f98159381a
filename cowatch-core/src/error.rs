use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Optimistic lock conflict")]
    OptimisticLockConflict,

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Whether the caller may retry the same operation unchanged.
    ///
    /// A version conflict is retryable only after re-deriving the proposal
    /// from the current state; `Unavailable` is retryable as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::OptimisticLockConflict)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Unavailable("probe timed out".to_string()).is_retryable());
        assert!(Error::OptimisticLockConflict.is_retryable());
        assert!(!Error::NotFound("session".to_string()).is_retryable());
        assert!(!Error::Authorization("not admitted".to_string()).is_retryable());
    }
}
