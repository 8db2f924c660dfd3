// src/ingest/error.rs
use thiserror::Error;

/// Why a source produced nothing this run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("transport error fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unparseable response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
}

impl FetchError {
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Status { .. } => "status",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Transport { .. } => "transport",
            FetchError::Parse { .. } => "parse",
            FetchError::InvalidEndpoint(_) => "endpoint",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record already stored for {source_name} / {link}")]
    Duplicate { source_name: String, link: String },

    #[error("store backend error: {0}")]
    Backend(String),
}
