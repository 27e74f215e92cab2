use thiserror::Error;

use vitrine_shared::SharedError;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported model format: {0}")]
    Unsupported(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Server answered {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Invalid {format} data: {reason}")]
    Parse { format: String, reason: String },

    #[error("Asset is empty: {0}")]
    Empty(String),

    #[error("No model at position {0}")]
    NotInList(usize),

    #[error("Load superseded by a newer request")]
    Superseded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn parse(format: impl ToString, reason: impl ToString) -> Self {
        LoadError::Parse {
            format: format.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<SharedError> for LoadError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::UnsupportedFormat(ext) => LoadError::Unsupported(ext),
            SharedError::MissingExtension(name) => LoadError::Unsupported(name),
        }
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => LoadError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => LoadError::Fetch(err.to_string()),
        }
    }
}
