//! Error taxonomy for the long-search pipeline

use std::io;

/// Failure reported by the search backend client on the current call.
///
/// The pipeline never retries these; recovery is an explicit `resume()`
/// by the caller after the failure surfaced.
#[derive(Debug)]
pub enum BackendError {
    /// HTTP-level failure with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Response arrived but could not be decoded as a page
    Malformed(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    /// Whether a backend client may try the same call again.
    ///
    /// 429 and 5xx are transient; a missing status means the request never
    /// got an answer (connect/timeout). Any other status, and any response
    /// the client could not decode, is final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                matches!(status, Some(429) | Some(500..=599) | None)
            }
            Self::Malformed(_) => false,
        }
    }
}

/// Iteration failure from a batch sequence.
///
/// In both cases the checkpoint keeps its last committed value, so a later
/// `resume()` continues from the last page known to be with the consumer.
#[derive(Debug)]
pub enum ScrollError {
    /// The backend call for the next page failed
    Backend(BackendError),
    /// The checkpoint could not be read, written, or removed
    Checkpoint(io::Error),
}

impl std::fmt::Display for ScrollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "{e}"),
            Self::Checkpoint(e) => write!(f, "checkpoint: {e}"),
        }
    }
}

impl std::error::Error for ScrollError {}

impl From<BackendError> for ScrollError {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

/// Malformed sink configuration, rejected before any backend call.
#[derive(Debug)]
pub enum ConfigError {
    /// File name template lacks the part-index placeholder
    MissingPartPlaceholder(String),
    /// Flush threshold must be a positive number of batches
    InvalidFlushThreshold(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPartPlaceholder(template) => {
                write!(f, "file name template {template:?} has no {{part}} placeholder")
            }
            Self::InvalidFlushThreshold(n) => {
                write!(f, "flush threshold must be >= 1, got {n}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure while draining a batch sequence to part files.
#[derive(Debug)]
pub enum SinkError {
    Config(ConfigError),
    Scroll(ScrollError),
    Io(io::Error),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}"),
            Self::Scroll(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<ConfigError> for SinkError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ScrollError> for SinkError {
    fn from(e: ScrollError) -> Self {
        Self::Scroll(e)
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
