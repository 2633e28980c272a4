use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Run-level errors. Any of these aborts the run before the report is rendered.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Couldn't extract the adjective table: {0}")]
    Extraction(String),

    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Couldn't load the source page: {0}")]
    SourcePage(#[from] FetchError),

    #[error("All {attempted} image writes into {dir} failed, the cache directory is unusable")]
    StorageExhausted { dir: PathBuf, attempted: usize },

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Couldn't install the log subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

/// Per-animal failures. These are recorded on the animal and never abort the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("{url} returned {len} bytes, expected at least {min}")]
    TooSmall { url: String, len: usize, min: usize },

    #[error("{url} sent more than {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("{url} returned {content_type}, not an image")]
    NotAnImage { url: String, content_type: String },

    #[error("no image source found for {name}")]
    NoSource { name: String },

    #[error("couldn't write {}: {message}", path.display())]
    Storage { path: PathBuf, message: String },

    #[error("fetch task for {name} didn't finish: {message}")]
    Aborted { name: String, message: String },
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Network,
    Validation,
    Storage,
    Internal,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Timeout { .. } | FetchError::Request { .. } | FetchError::Status { .. } => {
                FailureKind::Network
            }
            FetchError::EmptyBody { .. }
            | FetchError::TooSmall { .. }
            | FetchError::TooLarge { .. }
            | FetchError::NotAnImage { .. }
            | FetchError::NoSource { .. } => FailureKind::Validation,
            FetchError::Storage { .. } => FailureKind::Storage,
            FetchError::Aborted { .. } => FailureKind::Internal,
        }
    }

    /// Maps a `reqwest` error for `url`, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.into() }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.into(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Request {
                url: url.into(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        FetchError::Storage {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let url = "http://example.org/a.jpg".to_string();
        assert_eq!(
            FetchError::Status { url: url.clone(), status: 404 }.kind(),
            FailureKind::Network
        );
        assert_eq!(
            FetchError::TooSmall { url, len: 3, min: 32 }.kind(),
            FailureKind::Validation
        );
        assert_eq!(
            FetchError::storage("tmp/dog.jpg", std::io::ErrorKind::PermissionDenied.into()).kind(),
            FailureKind::Storage
        );
    }
}
