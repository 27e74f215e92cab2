use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("File name has no extension: {0}")]
    MissingExtension(String),
}
