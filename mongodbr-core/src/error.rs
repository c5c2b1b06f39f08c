//! Error types and result types for repository operations.
//!
//! Every fallible repository call returns [`RepositoryResult<T>`]. Errors raised by the
//! underlying store are carried unchanged inside [`RepositoryError::Backend`] so callers
//! can still downcast to the driver's own error type.

use bson::error::Error as BsonError;
use std::error::Error as StdError;
use thiserror::Error;

/// Represents all possible errors that can occur when calling a repository.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// An error raised by the underlying document store, kept as the error source.
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
    /// Conversion between Rust values and BSON failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during repository construction or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The index definition cannot be created.
    #[error("Invalid index: {0}")]
    InvalidIndex(String),
    /// The named index does not exist on the collection.
    #[error("Index not found: {0}")]
    IndexNotFound(String),
    /// A write would violate a unique index.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    /// A query, update, or pipeline operator is not supported by the repository.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
}

impl RepositoryError {
    /// Wraps a store error without altering it.
    pub fn backend<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        RepositoryError::Backend(Box::new(err))
    }

    /// Returns the wrapped store error as `E`, if this is a backend error of that type.
    pub fn downcast_backend<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            RepositoryError::Backend(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<BsonError> for RepositoryError {
    fn from(err: BsonError) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fmt, io};

    #[derive(Debug)]
    struct DriverError;

    impl fmt::Display for DriverError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl StdError for DriverError {}

    #[test]
    fn backend_errors_keep_their_source() {
        let err = RepositoryError::backend(DriverError);

        assert_eq!(err.to_string(), "Backend error: connection reset");
        assert!(err.downcast_backend::<DriverError>().is_some());
        assert!(err.downcast_backend::<io::Error>().is_none());
        assert!(err.source().is_some());
    }

    #[test]
    fn non_backend_errors_do_not_downcast() {
        let err = RepositoryError::InvalidIndex("no keys".into());

        assert!(err.downcast_backend::<DriverError>().is_none());
    }
}
