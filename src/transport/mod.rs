//! Single-attempt HTTP delivery of remote-write batches
mod auth;

pub use auth::{BasicAuthMiddleware, Credentials};

use log::{debug, trace};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::time::Duration;
use url::Url;

use crate::error::{ExporterError, Result};
use crate::wire::{self, Batch};

/// Client-side timeout for a single write
pub const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a successful write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    /// Samples written
    pub samples: usize,
    /// Whether the receiver reported the count itself
    pub confirmed: bool,
}

impl WriteStats {
    fn from_headers(headers: &HeaderMap, sent: usize) -> Self {
        let reported = headers
            .get(wire::SAMPLES_WRITTEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());

        match reported {
            Some(samples) => Self {
                samples,
                confirmed: true,
            },
            None => Self {
                samples: sent,
                confirmed: false,
            },
        }
    }

    pub fn no_data_written(&self) -> bool {
        self.samples == 0
    }
}

/// HTTP client that posts batches to a remote-write endpoint
pub struct RemoteWriteTransport {
    endpoint: Url,
    client: ClientWithMiddleware,
    authenticated: bool,
}

impl RemoteWriteTransport {
    /// Create a transport for `endpoint`, with Basic auth when `credentials` is set
    pub fn new(endpoint: Url, credentials: Option<&Credentials>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_CLIENT_TIMEOUT)
            .build()
            .map_err(ExporterError::FailedToCreateRemoteApi)?;

        // No retry middleware: the next tick is the retry
        let mut builder = ClientBuilder::new(client);
        if let Some(credentials) = credentials {
            debug!(
                "Using basic auth for remote_write as {}",
                credentials.username()
            );
            builder = builder.with(BasicAuthMiddleware::new(credentials)?);
        }

        Ok(Self {
            endpoint,
            client: builder.build(),
            authenticated: credentials.is_some(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// POST `batch` once. Any 2xx response is success.
    pub async fn send(&self, batch: &Batch) -> Result<WriteStats> {
        let body = wire::encode(&batch.request)?;
        trace!(
            "Posting {} series ({} bytes) to {}",
            batch.series_count(),
            body.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, wire::CONTENT_TYPE)
            .header(CONTENT_ENCODING, wire::CONTENT_ENCODING)
            .header(wire::VERSION_HEADER, wire::VERSION)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await;
            return Err(ExporterError::remote_write_failed(status.as_u16(), body));
        }

        Ok(WriteStats::from_headers(
            response.headers(),
            batch.sample_count(),
        ))
    }
}
