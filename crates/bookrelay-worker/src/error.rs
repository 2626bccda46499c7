//! Worker error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while decoding the inbound CSV object
#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("row {line} has {found} columns, at least {expected} are required")]
    TooFewColumns {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("expected {expected} fields in stream line, found {found}")]
    FieldCount { expected: usize, found: usize },
}

/// Errors raised by the object store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to fetch object '{key}': {message}")]
    Fetch { key: String, message: String },

    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors raised by the metadata lookup
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Lookup timed out")]
    Timeout,

    #[error("Lookup returned HTTP {0}")]
    Status(u16),

    #[error("Failed to decode lookup response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No items found for ISBN {0}")]
    NotFound(String),

    #[error("Empty identifier")]
    EmptyIdentifier,
}

/// Errors raised by the outbound stream
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Stream connection is closed")]
    Closed,

    #[error("Failed to encode stream header: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors that abort the processing of one file
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Malformed CSV input: {0}")]
    Csv(#[from] CsvError),
}

/// Errors raised by the work queue
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid AMQP URL: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Delivery source closed")]
    Closed,
}

/// Rejections returned by the status callback endpoint
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CallbackError {
    #[error("invalid json")]
    InvalidJson,

    #[error("missing status")]
    MissingStatus,

    #[error("invalid {0}")]
    InvalidField(&'static str),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "Rejected status callback");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
