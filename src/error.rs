use std::path::PathBuf;

use thiserror::Error;

/// Why a single fetch attempt failed. Recovered by the retry loop; only
/// escapes wrapped in [`ScrapeError::FetchExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientFetchFailure {
    #[error("unsuccessful response (HTTP {status})")]
    UnsuccessfulResponse { status: u16 },

    #[error("exception, possible network failure: {0}")]
    Transport(String),
}

impl TransientFetchFailure {
    /// Short label used in escalation mail subjects.
    pub fn class(&self) -> &'static str {
        match self {
            Self::UnsuccessfulResponse { .. } => "unsuccessful response",
            Self::Transport(_) => "exception/possible network failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last: TransientFetchFailure,
    },

    #[error("malformed header {text:?}: expected at least 5 space-separated tokens, found {tokens}")]
    MalformedHeaderFormat { text: String, tokens: usize },

    #[error("malformed markup: {0}")]
    MalformedDocument(String),

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode roles document: {0}")]
    Encode(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ScrapeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
