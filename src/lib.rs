//! Push the contents of a metric registry to a Prometheus remote-write endpoint

pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod symbols;
pub mod transport;
pub mod util;
pub mod wire;

/// Re-export of commonly used types for convenience
pub mod prelude {
    pub use crate::client::{DEFAULT_JOB, WriteClient, WriteClientBuilder};
    pub use crate::config::{ConfigBuilder, ExporterConfig, LogLevel};
    pub use crate::error::{ExporterError, Result};
    pub use crate::source::{MetricDesc, MetricSource, MetricValue, RawMetric, StaticSource};
    pub use crate::transport::{Credentials, WriteStats};
    pub use crate::wire::Batch;
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
