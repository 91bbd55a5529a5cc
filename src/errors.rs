//! Error types for the fetch and store halves of the pipeline.
//!
//! Fetch errors are reported per tick and never abort the process. Store
//! errors only exist for the write path: a collection that cannot be read is
//! recovered to empty inside [`crate::store::Store::load`] and surfaces here
//! only as the private [`CorruptStore`] reason.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single fetch produced no item.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout or a broken body stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The body was not UTF-8 or not JSON.
    #[error("could not decode response body: {0}")]
    Decode(String),

    /// The payload carried none of the configured content fields.
    #[error("payload has no usable content field (looked for {fields:?})")]
    MissingField { fields: Vec<String> },
}

impl FetchError {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

/// Failures that surface from the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to write collection to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("refusing to store text that is blank after normalization")]
    BlankText,
}

/// Flags that parse but do not make a usable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("--text is blank after normalization")]
    BlankText,
}

/// Reason a persisted collection was discarded on load.
///
/// Single array elements that are not records are not a reason; they are
/// carried through untouched.
#[derive(Error, Debug)]
pub(crate) enum CorruptStore {
    #[error("could not read file: {0}")]
    Unreadable(#[source] std::io::Error),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("top-level value is not an array")]
    NotAnArray,
}
