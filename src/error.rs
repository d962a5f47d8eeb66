// src/error.rs
use thiserror::Error;

/// Result type used across the crate
pub type Result<T, E = ExporterError> = std::result::Result<T, E>;

/// Error type for the remote-write exporter
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("No endpoint provided for remote_write")]
    MissingEndpoint,

    #[error("No instance label provided for remote_write")]
    MissingInstance,

    #[error("No job label provided for remote_write")]
    MissingJob,

    #[error("No registry provided for remote_write")]
    MissingRegistry,

    #[error("Basic auth requires both a username and a password")]
    MissingAuthCredentials,

    #[error("Invalid remote_write endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Failed to create remote_write API client: {0}")]
    FailedToCreateRemoteApi(#[source] reqwest::Error),

    #[error("Invalid metric description: {desc}")]
    InvalidMetricDesc { desc: String },

    #[error("Unknown metric type for {name}")]
    UnknownMetricType { name: String },

    #[error("Metric {name} has more than one value type populated")]
    AmbiguousMetricType { name: String },

    #[error("Metric source failed: {0}")]
    Source(String),

    #[error("Remote write failed with status {status_code}: {body}")]
    RemoteWriteFailed { status_code: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest_middleware::Error),

    #[error("Failed to encode remote_write request: {0}")]
    Encode(String),

    #[error("Client is already running")]
    ClientAlreadyRunning,

    #[error("Interval must be greater than zero")]
    InvalidInterval,

    #[error("No tokio runtime available to run the client")]
    NoRuntime,

    #[error("Config error: {0}")]
    Config(String),
}

impl ExporterError {
    /// Build a `RemoteWriteFailed` from a response body read attempt.
    ///
    /// If reading the body failed, the read error's description stands in for the body.
    pub fn remote_write_failed<E: std::fmt::Display>(
        status_code: u16,
        body: std::result::Result<String, E>,
    ) -> Self {
        let body = match body {
            Ok(body) => body,
            Err(e) => format!("failed to read response body: {}", e),
        };
        ExporterError::RemoteWriteFailed { status_code, body }
    }
}
