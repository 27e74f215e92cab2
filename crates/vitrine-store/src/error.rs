use thiserror::Error;

use vitrine_shared::RecordId;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading, writing or renaming a collection file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The collection file is not a valid JSON array of records.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No record with this id exists in the collection.
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    /// A batch selector matched nothing.
    #[error("No records match: {0}")]
    NoMatch(String),

    /// The request was well-formed JSON but semantically unusable.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
