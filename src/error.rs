use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an embedding call failed. Only rate limits are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingErrorKind {
    Auth,
    RateLimited,
    Network,
    InvalidResponse,
    DimensionMismatch,
}

#[derive(Debug, Error)]
#[error("embedding failed ({kind:?}): {message}")]
pub struct EmbeddingError {
    pub kind: EmbeddingErrorKind,
    pub message: String,
}

impl EmbeddingError {
    pub fn new(kind: EmbeddingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::new(
            EmbeddingErrorKind::DimensionMismatch,
            format!("expected {expected} dimensions, got {actual}"),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == EmbeddingErrorKind::RateLimited
    }
}

/// Errors surfaced by the retrieval engine and the validation pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("LLM response does not match the validation schema: {0}")]
    SchemaValidation(String),

    #[error("LLM response is not parseable as JSON: {0}")]
    ResponseParse(String),

    #[error("LLM evaluation failed: {message}")]
    Evaluation { message: String, retryable: bool },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("record not found: {0}")]
    NotFound(Uuid),
}

impl Error {
    /// Whether the caller's backoff policy should try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Embedding(e) => e.is_retryable(),
            Error::Evaluation { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limits_are_retryable() {
        let rate = EmbeddingError::new(EmbeddingErrorKind::RateLimited, "429");
        let auth = EmbeddingError::new(EmbeddingErrorKind::Auth, "401");
        let net = EmbeddingError::new(EmbeddingErrorKind::Network, "refused");
        assert!(rate.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!net.is_retryable());
        assert!(Error::from(rate).is_retryable());
    }

    #[test]
    fn test_retrieval_and_schema_errors_not_retryable() {
        assert!(!Error::Retrieval("connection reset".into()).is_retryable());
        assert!(!Error::SchemaValidation("missing field".into()).is_retryable());
        assert!(Error::Evaluation {
            message: "429".into(),
            retryable: true
        }
        .is_retryable());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let e = EmbeddingError::dimension_mismatch(1536, 1024);
        assert_eq!(e.kind, EmbeddingErrorKind::DimensionMismatch);
        assert!(e.to_string().contains("expected 1536 dimensions, got 1024"));
    }
}
