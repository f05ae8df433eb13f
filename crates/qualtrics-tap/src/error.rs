//! Error types for the Qualtrics tap
//!
//! [`TapError`] is fatal to an export cycle. [`RowError`] covers a single
//! malformed row; those are logged and skipped by the normalizer.

use qualtrics_common::CommonError;
use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for tap operations
pub type Result<T> = std::result::Result<T, TapError>;

/// Why a single HTTP request failed once retries were exhausted
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("response body interrupted: {0}")]
    Interrupted(#[source] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Body(String),
}

impl RequestError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Transport(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            },
            RequestError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            },
            RequestError::Interrupted(_) => true,
            RequestError::Body(_) => false,
        }
    }
}

/// Errors that abort an export cycle
#[derive(Error, Debug)]
pub enum TapError {
    #[error("Export could not be started: {0}")]
    Submission(#[source] RequestError),

    #[error("Status check for export {progress_id} failed: {source}")]
    PollTransport {
        progress_id: String,
        #[source]
        source: RequestError,
    },

    #[error("Export {progress_id} failed on the server; a new export must be submitted")]
    ExportFailed { progress_id: String },

    #[error("Export {progress_id} still not complete after {attempts} status checks")]
    PollTimeout { progress_id: String, attempts: u32 },

    #[error("Export {progress_id} cancelled while waiting for completion")]
    Cancelled { progress_id: String },

    #[error("Download of export file {file_id} failed: {source}")]
    Download {
        file_id: String,
        #[source]
        source: RequestError,
    },

    #[error("Export archive contains no files")]
    EmptyArtifact,

    #[error("Export archive is not a readable zip file: {0}")]
    ArchiveFormat(#[from] zip::result::ZipError),

    #[error("Export table is missing the identifier column '{0}'")]
    MissingIdentifierColumn(String),

    #[error("Export table could not be read: {0}")]
    Normalization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Replication state error: {0}")]
    State(String),

    #[error("Record sink error: {0}")]
    Sink(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TapError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a replication state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}

/// A row the normalizer could not turn into a record
#[derive(Error, Debug)]
pub enum RowError {
    #[error("line {line}: malformed row: {source}")]
    Malformed {
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("line {line}: empty identifier '{field}'")]
    MissingIdentifier { line: u64, field: String },

    #[error("line {line}: identifier '{id}' already emitted in this export")]
    DuplicateIdentifier { line: u64, id: String },
}
