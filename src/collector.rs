//! Converts the contents of a registry into a remote-write batch
use chrono::Utc;
use log::trace;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{ExporterError, Result};
use crate::source::{MetricSource, RawMetric};
use crate::symbols::SymbolTable;
use crate::wire::{Batch, Metadata, Sample, TimeSeries};

pub const NAME_LABEL: &str = "__name__";
pub const INSTANCE_LABEL: &str = "instance";
pub const JOB_LABEL: &str = "job";

/// Labels set by the collector itself; metric labels with these names are dropped
const RESERVED_LABELS: [&str; 3] = [NAME_LABEL, INSTANCE_LABEL, JOB_LABEL];

/// Channel buffer between the registry and the collector
const DEFAULT_BUFFER_SIZE: usize = 128;

/// Drains a registry into a [`Batch`]
pub struct Collector<R: MetricSource> {
    registry: Arc<R>,
    instance: String,
    job: String,
    buffer_size: usize,
}

impl<R: MetricSource> Collector<R> {
    pub fn new(registry: Arc<R>, instance: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            registry,
            instance: instance.into(),
            job: job.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Set the channel buffer size used while enumerating the registry
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Collect every registered metric into one batch.
    ///
    /// All or nothing: the first malformed metric aborts the whole batch.
    pub async fn collect(&self) -> Result<Batch> {
        let (tx, mut rx) = mpsc::channel(self.buffer_size);
        let registry = Arc::clone(&self.registry);
        let producer = tokio::spawn(async move { registry.collect(tx).await });

        let mut symbols = SymbolTable::new();
        let mut timeseries = Vec::new();

        // Returning early drops `rx`, which ends the producer's enumeration
        while let Some(metric) = rx.recv().await {
            timeseries.push(self.series_for(&metric, &mut symbols)?);
        }

        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                return Err(ExporterError::Source(format!(
                    "{} enumeration task failed: {}",
                    self.registry.name(),
                    e
                )));
            }
        }

        trace!(
            "Collected {} series with {} symbols from {}",
            timeseries.len(),
            symbols.len(),
            self.registry.name()
        );

        Ok(Batch::new(symbols, timeseries))
    }

    /// Build the time series for a single metric, interning its strings into `symbols`
    pub fn series_for(&self, metric: &RawMetric, symbols: &mut SymbolTable) -> Result<TimeSeries> {
        let name = metric.desc.fq_name()?;
        let help = metric.desc.help();

        let mut labels: Vec<&str> = Vec::with_capacity(2 * (metric.labels.len() + 3));
        labels.extend([
            NAME_LABEL,
            name,
            INSTANCE_LABEL,
            self.instance.as_str(),
            JOB_LABEL,
            self.job.as_str(),
        ]);
        for (label, value) in &metric.labels {
            if !RESERVED_LABELS.contains(&label.as_str()) {
                labels.push(label);
                labels.push(value);
            }
        }

        let value = metric.value()?;

        Ok(TimeSeries {
            metadata: Some(Metadata {
                r#type: value.metric_type() as i32,
                help_ref: symbols.intern(help),
                unit_ref: 0,
            }),
            labels_refs: symbols.intern_labels(&labels),
            samples: vec![Sample {
                value: value.value(),
                timestamp: Utc::now().timestamp_millis(),
            }],
        })
    }
}
