use thiserror::Error;

/// Errors from repository operations (used by trait definitions in flowrun-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from a text generation backend.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no text generator configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("provider returned no text")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
        assert_eq!(RepositoryError::NotFound.to_string(), "entity not found");
    }

    #[test]
    fn test_generate_error_display() {
        let err = GenerateError::Status {
            status: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "provider returned status 429: quota exceeded");
        assert_eq!(
            GenerateError::NotConfigured.to_string(),
            "no text generator configured"
        );
    }
}
