use thiserror::Error;

/// Errors from repository operations (used by trait definitions in pillars-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to assessment draft operations.
///
/// A missing draft is never an error: loads return `Ok(None)`.
#[derive(Debug, Error)]
pub enum DraftError {
    /// Any failure to read, write or delete the stored row (including timeouts).
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The operation targets a specific draft that does not exist.
    #[error("draft not found: {0}")]
    NotFound(String),

    #[error("invalid draft: {0}")]
    Invalid(String),

    /// Best-effort recovery failed. Logged, never surfaced.
    #[error("recovery error: {0}")]
    Recovery(String),
}

impl From<RepositoryError> for DraftError {
    fn from(e: RepositoryError) -> Self {
        DraftError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_repository_error_converts_to_persistence() {
        let err: DraftError = RepositoryError::Conflict("duplicate draft".to_string()).into();
        assert!(matches!(err, DraftError::Persistence(_)));
        assert_eq!(err.to_string(), "persistence error: conflict: duplicate draft");
    }

    #[test]
    fn test_draft_error_display() {
        let err = DraftError::NotFound("0190".to_string());
        assert_eq!(err.to_string(), "draft not found: 0190");
    }
}
