//! Error types shared across crates

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that make correct operation impossible.
///
/// Expected absence of data is not an error; it travels as
/// [`crate::Lookup::NotFound`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Reranker error: {0}")]
    Reranker(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Classify the error without carrying its payload
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            Error::DataIntegrity(_) => ErrorKind::DataIntegrity,
            Error::Embedding(_) => ErrorKind::Embedding,
            Error::Reranker(_) => ErrorKind::Reranker,
            Error::Retrieval(_) => ErrorKind::Retrieval,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) | Error::Serialization(_) => ErrorKind::Io,
        }
    }
}

/// Payload-free error classification, used inside [`crate::Lookup::Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DependencyUnavailable,
    DataIntegrity,
    Embedding,
    Reranker,
    Retrieval,
    Config,
    Io,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = Error::DataIntegrity("index has 3 vectors, metadata has 4".to_string());
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("metadata has 4"));

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::Io);
    }
}
