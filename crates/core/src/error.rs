//! Error types shared by the store pipeline.

use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;

/// Failure to retrieve a side-file.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The reference cannot be turned into a URL or path
    #[error("Invalid side-file reference `{reference}`: {reason}")]
    InvalidReference {
        /// Reference as found on the record
        reference: String,
        /// Why it was rejected
        reason: String,
    },
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Transport error or unreadable body
    #[error("Request to {url} failed: {source}")]
    Request {
        /// Resolved URL
        url: String,
        /// Underlying client error
        source: reqwest::Error,
    },
    /// Non-success HTTP status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Resolved URL
        url: String,
        /// Status returned by the server
        status: StatusCode,
    },
    /// Local read failure
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        /// Resolved path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Why a single record could not be enriched.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// The side-file could not be retrieved
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Retrieval did not finish within the configured timeout
    #[error("Retrieval timed out after {0:?}")]
    Timeout(Duration),
    /// The OCR payload is not valid JSON
    #[error("Invalid OCR document: {0}")]
    Parse(#[from] serde_json::Error),
    /// The OCR payload has no `pages` array
    #[error("OCR document has no `pages` array")]
    UnexpectedShape,
    /// An element of the OCR document cannot be read
    #[error("Malformed OCR document: {0}")]
    Malformed(String),
}

impl EnrichError {
    /// Whether operators should hear about this failure.
    ///
    /// A well-formed document without pages leaves the field empty quietly.
    pub fn is_diagnostic(&self) -> bool {
        !matches!(self, EnrichError::UnexpectedShape)
    }
}

/// Errors while reading inputs or writing the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem error
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Malformed CSV input
    #[error("Failed to read CSV {}: {source}", .path.display())]
    Csv {
        /// Path involved
        path: PathBuf,
        /// Underlying CSV error
        source: csv::Error,
    },
    /// Malformed JSON input, or a store that cannot be serialized
    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        /// Path involved
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },
    /// A required CSV column is missing
    #[error("{} has no `{column}` column", .path.display())]
    MissingColumn {
        /// Path involved
        path: PathBuf,
        /// Column that was expected
        column: &'static str,
    },
    /// The input does not have the expected shape
    #[error("Unexpected content in {}: {reason}", .path.display())]
    Shape {
        /// Path involved
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
}
