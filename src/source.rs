use crate::error::{ExporterError, Result};
use crate::wire::MetricType;
use log::debug;
use parking_lot::RwLock;
use prometheus::proto::MetricFamily;
use std::fmt;
use tokio::sync::mpsc;

/// Descriptor of a metric as exposed by its registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricDesc {
    /// Fully-qualified metric name
    pub name: Option<String>,
    /// Help text
    pub help: Option<String>,
    /// Names of the variable labels the metric declares
    pub label_names: Vec<String>,
}

impl MetricDesc {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            help: Some(help.into()),
            label_names: Vec::new(),
        }
    }

    /// The canonical metric name, if it is present and well formed
    pub fn fq_name(&self) -> Result<&str> {
        match self.name.as_deref() {
            Some(name) if is_valid_metric_name(name) => Ok(name),
            _ => Err(ExporterError::InvalidMetricDesc {
                desc: self.to_string(),
            }),
        }
    }

    /// Help text, empty when the registry has none
    pub fn help(&self) -> &str {
        self.help.as_deref().unwrap_or("")
    }
}

impl fmt::Display for MetricDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Desc{{fqName: {:?}, help: {:?}, variableLabels: {:?}}}",
            self.name.as_deref().unwrap_or(""),
            self.help(),
            self.label_names
        )
    }
}

/// Metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// The single value carried by a metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(f64),
    Gauge(f64),
    Untyped(f64),
}

impl MetricValue {
    pub fn value(&self) -> f64 {
        match *self {
            MetricValue::Counter(v) | MetricValue::Gauge(v) | MetricValue::Untyped(v) => v,
        }
    }

    /// Remote-write metadata type for this value
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Untyped(_) => MetricType::Unspecified,
        }
    }
}

/// A metric as handed over by a registry, before classification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetric {
    pub desc: MetricDesc,
    /// Label name/value pairs in the order the registry reports them
    pub labels: Vec<(String, String)>,
    pub counter: Option<f64>,
    pub gauge: Option<f64>,
    pub untyped: Option<f64>,
}

impl RawMetric {
    pub fn counter(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            desc: MetricDesc::new(name, help),
            counter: Some(value),
            ..Default::default()
        }
    }

    pub fn gauge(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            desc: MetricDesc::new(name, help),
            gauge: Some(value),
            ..Default::default()
        }
    }

    pub fn untyped(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            desc: MetricDesc::new(name, help),
            untyped: Some(value),
            ..Default::default()
        }
    }

    /// Append a label, declaring its name on the descriptor as well
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.desc.label_names.push(name.clone());
        self.labels.push((name, value.into()));
        self
    }

    /// Classify the populated value. Exactly one of the three must be set.
    pub fn value(&self) -> Result<MetricValue> {
        let populated = [
            self.counter.map(MetricValue::Counter),
            self.gauge.map(MetricValue::Gauge),
            self.untyped.map(MetricValue::Untyped),
        ];
        let mut values = populated.into_iter().flatten();

        let name = || self.desc.name.clone().unwrap_or_default();
        match (values.next(), values.next()) {
            (Some(v), None) => Ok(v),
            (None, _) => Err(ExporterError::UnknownMetricType { name: name() }),
            (Some(_), Some(_)) => Err(ExporterError::AmbiguousMetricType { name: name() }),
        }
    }
}

/// A registry that can enumerate its metrics
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync + 'static {
    /// Send every currently registered metric into `tx`.
    ///
    /// Returns once enumeration is complete. A closed channel means the
    /// consumer gave up; implementations stop early and return `Ok`.
    async fn collect(&self, tx: mpsc::Sender<RawMetric>) -> Result<()>;

    /// Get the source name
    fn name(&self) -> &str {
        "registry"
    }
}

#[async_trait::async_trait]
impl MetricSource for prometheus::Registry {
    async fn collect(&self, tx: mpsc::Sender<RawMetric>) -> Result<()> {
        let metrics: Vec<RawMetric> = self.gather().iter().flat_map(flatten_family).collect();

        for metric in metrics {
            if tx.send(metric).await.is_err() {
                debug!("Metric consumer went away, stopping enumeration");
                break;
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "prometheus"
    }
}

/// Split a gathered family into one raw metric per label combination.
///
/// Values are taken from whichever sub-message is present, so summaries and
/// histograms leave every value unset.
fn flatten_family(family: &MetricFamily) -> Vec<RawMetric> {
    let help = family.help();

    family
        .metric
        .iter()
        .map(|m| {
            let labels: Vec<(String, String)> = m
                .label
                .iter()
                .map(|l| (l.name().to_string(), l.value().to_string()))
                .collect();

            RawMetric {
                desc: MetricDesc {
                    name: Some(family.name().to_string()),
                    help: (!help.is_empty()).then(|| help.to_string()),
                    label_names: labels.iter().map(|(n, _)| n.clone()).collect(),
                },
                labels,
                counter: m.counter.as_ref().map(|c| c.value()),
                gauge: m.gauge.as_ref().map(|g| g.value()),
                untyped: m.untyped.as_ref().map(|u| u.value()),
            }
        })
        .collect()
}

/// An in-memory source over a fixed set of metrics
pub struct StaticSource {
    name: String,
    metrics: RwLock<Vec<RawMetric>>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, metrics: Vec<RawMetric>) -> Self {
        Self {
            name: name.into(),
            metrics: RwLock::new(metrics),
        }
    }

    /// Swap the metrics returned by subsequent collections
    pub fn replace(&self, metrics: Vec<RawMetric>) {
        *self.metrics.write() = metrics;
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

#[async_trait::async_trait]
impl MetricSource for StaticSource {
    async fn collect(&self, tx: mpsc::Sender<RawMetric>) -> Result<()> {
        let metrics = self.metrics.read().clone();
        for metric in metrics {
            if tx.send(metric).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
