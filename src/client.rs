//! The remote-write client: configuration, validation and lifecycle
use log::{debug, error};
use std::sync::{Arc, Weak};
use std::time::Duration;
use url::Url;

use crate::collector::Collector;
use crate::error::{ExporterError, Result};
use crate::scheduler::Scheduler;
use crate::source::MetricSource;
use crate::transport::{Credentials, RemoteWriteTransport, WriteStats};
use crate::wire::Batch;

/// Job label used when none is configured
pub const DEFAULT_JOB: &str = "promremote";

/// Local hostname, or an empty string when it cannot be determined
pub fn default_instance() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default()
}

struct Inner<R: MetricSource> {
    endpoint: String,
    instance: String,
    job: String,
    registry: Arc<R>,
    collector: Collector<R>,
    transport: RemoteWriteTransport,
    scheduler: Scheduler,
}

impl<R: MetricSource> Inner<R> {
    /// One collect-and-send cycle. Failures are logged, never propagated.
    async fn tick(&self) {
        let batch = match self.collector.collect().await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to collect metrics for remote_write: {}", e);
                return;
            }
        };

        match self.transport.send(&batch).await {
            Ok(stats) => debug!(
                "Successfully sent metrics via remote_write: count={} written={}",
                stats.samples,
                !stats.no_data_written()
            ),
            Err(e) => error!("Failed to send metrics to remote endpoint: {}", e),
        }
    }
}

impl<R: MetricSource> Drop for Inner<R> {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

/// Pushes the contents of a registry to a remote-write endpoint.
///
/// Clones share the same configuration and background loop.
pub struct WriteClient<R: MetricSource = prometheus::Registry> {
    inner: Arc<Inner<R>>,
}

impl<R: MetricSource> Clone for WriteClient<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: MetricSource> WriteClient<R> {
    pub fn builder(endpoint: impl Into<String>) -> WriteClientBuilder<R> {
        WriteClientBuilder::new(endpoint)
    }

    /// Create a client without authentication
    pub fn new(
        endpoint: impl Into<String>,
        instance: impl Into<String>,
        job: impl Into<String>,
        registry: Arc<R>,
    ) -> Result<Self> {
        Self::builder(endpoint)
            .instance(instance)
            .job(job)
            .registry(registry)
            .build()
    }

    pub fn registry(&self) -> Arc<R> {
        Arc::clone(&self.inner.registry)
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn instance(&self) -> &str {
        &self.inner.instance
    }

    pub fn job(&self) -> &str {
        &self.inner.job
    }

    /// Collect a batch without sending it
    pub async fn collect(&self) -> Result<Batch> {
        self.inner.collector.collect().await
    }

    /// Collect and send once on the caller's task
    pub async fn push(&self) -> Result<WriteStats> {
        let batch = self.inner.collector.collect().await?;
        self.inner.transport.send(&batch).await
    }

    /// Start pushing every `interval` in the background.
    ///
    /// Fails with `ClientAlreadyRunning` if a loop is already active. The loop
    /// ends once every handle to this client has been dropped.
    pub fn run(&self, interval: Duration) -> Result<()> {
        let weak: Weak<Inner<R>> = Arc::downgrade(&self.inner);
        self.inner.scheduler.start(interval, move || {
            let inner = weak.upgrade();
            async move {
                if let Some(inner) = inner {
                    inner.tick().await;
                }
            }
        })
    }

    /// Ask the background loop to stop. A no-op when not running.
    pub fn stop(&self) {
        self.inner.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.scheduler.is_running()
    }
}

/// Builder for [`WriteClient`]
pub struct WriteClientBuilder<R: MetricSource> {
    endpoint: String,
    instance: Option<String>,
    job: Option<String>,
    registry: Option<Arc<R>>,
    username: Option<String>,
    password: Option<String>,
    buffer_size: Option<usize>,
}

impl<R: MetricSource> WriteClientBuilder<R> {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            instance: None,
            job: None,
            registry: None,
            username: None,
            password: None,
            buffer_size: None,
        }
    }

    /// Set the instance label. Defaults to the local hostname.
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Set the job label. Defaults to [`DEFAULT_JOB`].
    pub fn job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }

    pub fn registry(mut self, registry: Arc<R>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Authenticate with HTTP Basic auth. Both parts must be non-empty.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Channel buffer between registry and collector
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    pub fn build(self) -> Result<WriteClient<R>> {
        if self.endpoint.is_empty() {
            return Err(ExporterError::MissingEndpoint);
        }
        let instance = self.instance.unwrap_or_else(default_instance);
        if instance.is_empty() {
            return Err(ExporterError::MissingInstance);
        }
        let job = self.job.unwrap_or_else(|| DEFAULT_JOB.to_string());
        if job.is_empty() {
            return Err(ExporterError::MissingJob);
        }
        let registry = self.registry.ok_or(ExporterError::MissingRegistry)?;

        let credentials = match (self.username, self.password) {
            (None, None) => None,
            (username, password) => Some(Credentials::new(
                username.unwrap_or_default(),
                password.unwrap_or_default(),
            )?),
        };

        let url = parse_endpoint(&self.endpoint)?;
        let transport = RemoteWriteTransport::new(url, credentials.as_ref())?;

        let mut collector = Collector::new(Arc::clone(&registry), instance.clone(), job.clone());
        if let Some(buffer_size) = self.buffer_size {
            collector = collector.with_buffer_size(buffer_size);
        }

        Ok(WriteClient {
            inner: Arc::new(Inner {
                endpoint: self.endpoint,
                instance,
                job,
                registry,
                collector,
                transport,
                scheduler: Scheduler::new(),
            }),
        })
    }
}

/// The endpoint is used exactly as given; no default path is appended
fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| ExporterError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {:?}", other))),
    }
    if !url.has_host() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RawMetric, StaticSource};

    const ENDPOINT: &str = "http://localhost:9090/api/v1/write";

    fn registry() -> Arc<StaticSource> {
        Arc::new(StaticSource::new(
            "test",
            vec![RawMetric::gauge("up", "Up", 1.0)],
        ))
    }

    fn build_err(builder: WriteClientBuilder<StaticSource>) -> ExporterError {
        match builder.build() {
            Ok(_) => panic!("expected construction to fail"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            build_err(WriteClient::builder("").instance("i").job("j").registry(registry())),
            ExporterError::MissingEndpoint
        ));
        assert!(matches!(
            build_err(WriteClient::builder(ENDPOINT).instance("").job("j").registry(registry())),
            ExporterError::MissingInstance
        ));
        assert!(matches!(
            build_err(WriteClient::builder(ENDPOINT).instance("i").job("").registry(registry())),
            ExporterError::MissingJob
        ));
        assert!(matches!(
            build_err(WriteClient::builder(ENDPOINT).instance("i").job("j")),
            ExporterError::MissingRegistry
        ));
        assert!(matches!(
            build_err(
                WriteClient::builder(ENDPOINT)
                    .instance("i")
                    .job("j")
                    .registry(registry())
                    .basic_auth("user", "")
            ),
            ExporterError::MissingAuthCredentials
        ));
        assert!(matches!(
            build_err(
                WriteClient::builder("not a url")
                    .instance("i")
                    .job("j")
                    .registry(registry())
            ),
            ExporterError::InvalidEndpoint { .. }
        ));
        assert!(matches!(
            build_err(
                WriteClient::builder("ftp://example.com/write")
                    .instance("i")
                    .job("j")
                    .registry(registry())
            ),
            ExporterError::InvalidEndpoint { .. }
        ));
    }

    #[test]
    fn test_new_and_accessors() {
        let reg = registry();
        let client =
            WriteClient::new(ENDPOINT, "testinstance", "testjob", Arc::clone(&reg)).unwrap();
        assert_eq!(client.endpoint(), ENDPOINT);
        assert_eq!(client.instance(), "testinstance");
        assert_eq!(client.job(), "testjob");
        assert!(Arc::ptr_eq(&client.registry(), &reg));
        assert!(!client.is_running());
    }

    #[test]
    fn test_job_defaults() {
        let client = WriteClient::builder(ENDPOINT)
            .instance("i")
            .registry(registry())
            .build()
            .unwrap();
        assert_eq!(client.job(), DEFAULT_JOB);
    }

    #[test]
    fn test_instance_defaults_to_hostname() {
        let hostname = default_instance();
        let result = WriteClient::builder(ENDPOINT).registry(registry()).build();
        if hostname.is_empty() {
            assert!(matches!(result, Err(ExporterError::MissingInstance)));
        } else {
            assert_eq!(result.unwrap().instance(), hostname);
        }
    }

    #[test]
    fn test_endpoint_path_kept_verbatim() {
        let url = parse_endpoint("https://metrics.example.com/custom/push").unwrap();
        assert_eq!(url.path(), "/custom/push");
        let bare = parse_endpoint("https://metrics.example.com").unwrap();
        assert_eq!(bare.path(), "/");
    }

    #[tokio::test]
    async fn test_collect_labels_from_config() {
        let client = WriteClient::new(ENDPOINT, "host-a", "exporter", registry()).unwrap();
        let batch = client.collect().await.unwrap();
        assert_eq!(
            batch.labels(0).unwrap(),
            vec![("__name__", "up"), ("instance", "host-a"), ("job", "exporter")]
        );
    }

    #[tokio::test]
    async fn test_stop_before_run_is_noop() {
        let client = WriteClient::new(ENDPOINT, "i", "j", registry()).unwrap();
        client.stop();
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let client = WriteClient::new(ENDPOINT, "i", "j", registry()).unwrap();
        client.run(Duration::from_secs(60)).unwrap();
        assert!(matches!(
            client.clone().run(Duration::from_secs(60)),
            Err(ExporterError::ClientAlreadyRunning)
        ));
        assert!(client.is_running());
        client.stop();
    }
}
