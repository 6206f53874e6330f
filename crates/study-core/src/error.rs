//! Error types for study operations.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StudyError {
    /// Missing word, or a word owned by someone else.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Arguments outside their declared bounds.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A repository or store call failed.
    #[error("Dependency failure: {0}")]
    DependencyFailure(#[source] StoreError),
}

pub type StudyResult<T> = Result<T, StudyError>;

impl From<StoreError> for StudyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::DependencyFailure(other),
        }
    }
}
