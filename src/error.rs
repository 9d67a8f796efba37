//! Error types shared by the corpus loaders and the upstream clients.

use std::path::PathBuf;
use std::time::Duration;

/// Failure talking to an embedding or chat completion provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// API key missing or not usable as a header value.
    #[error("invalid provider credential: {0}")]
    Credential(String),
    /// Transport-level failure (connect, TLS, timeout inside reqwest).
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },
    /// Response body did not have the expected shape.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    /// Provider answered successfully but without any payload.
    #[error("provider returned no data")]
    Empty,
    /// The call did not finish within the configured bound.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    /// The blocking worker running the call died.
    #[error("provider task failed: {0}")]
    Task(String),
}

/// Failure loading the corpus, the vector store, or the rule table.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// File could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid JSON of the expected shape.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// One JSONL line is malformed.
    #[error("invalid record at {}:{line}: {source}", .path.display())]
    Line {
        /// Offending file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// File parsed but holds no usable entries.
    #[error("{} contains no entries", .path.display())]
    Empty {
        /// Offending file.
        path: PathBuf,
    },
    /// Rule table could not be read.
    #[error(transparent)]
    Rules(#[from] filter_rules::TableError),
    /// The store was built in memory and has nothing to reload from.
    #[error("no data source configured")]
    NoSource,
}
