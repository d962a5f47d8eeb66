//! Prometheus remote-write 2.0 messages and their on-the-wire encoding
//!
//! The messages mirror `io.prometheus.write.v2` and only declare the fields
//! this exporter fills in. Unknown fields on decode are skipped by prost.
use prost::Message;

use crate::error::{ExporterError, Result};
use crate::symbols::SymbolTable;

/// `Content-Type` for a remote-write 2.0 request
pub const CONTENT_TYPE: &str = "application/x-protobuf;proto=io.prometheus.write.v2.Request";
/// `Content-Encoding` for a remote-write request body
pub const CONTENT_ENCODING: &str = "snappy";
pub const VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
pub const VERSION: &str = "2.0.0";
/// Response header carrying the number of samples the receiver stored
pub const SAMPLES_WRITTEN_HEADER: &str = "X-Prometheus-Remote-Write-Samples-Written";

#[derive(Clone, PartialEq, Message)]
pub struct Request {
    #[prost(string, repeated, tag = "4")]
    pub symbols: Vec<String>,
    #[prost(message, repeated, tag = "5")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    /// Alternating name/value references into `Request::symbols`
    #[prost(uint32, repeated, tag = "1")]
    pub labels_refs: Vec<u32>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
    #[prost(message, optional, tag = "5")]
    pub metadata: Option<Metadata>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    /// Milliseconds since the Unix epoch
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Metadata {
    #[prost(enumeration = "MetricType", tag = "1")]
    pub r#type: i32,
    #[prost(uint32, tag = "3")]
    pub help_ref: u32,
    #[prost(uint32, tag = "4")]
    pub unit_ref: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    Unspecified = 0,
    Counter = 1,
    Gauge = 2,
    Histogram = 3,
    GaugeHistogram = 4,
    Summary = 5,
    Info = 6,
    Stateset = 7,
}

/// The output of one collection pass
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub request: Request,
}

impl Batch {
    pub fn new(symbols: SymbolTable, timeseries: Vec<TimeSeries>) -> Self {
        Self {
            request: Request {
                symbols: symbols.into_symbols(),
                timeseries,
            },
        }
    }

    pub fn series_count(&self) -> usize {
        self.request.timeseries.len()
    }

    pub fn sample_count(&self) -> usize {
        self.request.timeseries.iter().map(|ts| ts.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.request.timeseries.is_empty()
    }

    /// Resolve the label references of series `idx` back into strings
    pub fn labels(&self, idx: usize) -> Option<Vec<(&str, &str)>> {
        let ts = self.request.timeseries.get(idx)?;
        let symbols = &self.request.symbols;
        ts.labels_refs
            .chunks(2)
            .map(|pair| {
                let name = symbols.get(*pair.first()? as usize)?;
                let value = symbols.get(*pair.get(1)? as usize)?;
                Some((name.as_str(), value.as_str()))
            })
            .collect()
    }
}

/// Serialize and snappy-compress a request body
pub fn encode(request: &Request) -> Result<Vec<u8>> {
    let raw = request.encode_to_vec();
    snap::raw::Encoder::new()
        .compress_vec(&raw)
        .map_err(|e| ExporterError::Encode(e.to_string()))
}

/// Decompress and parse a request body produced by [`encode`]
pub fn decode(body: &[u8]) -> Result<Request> {
    let raw = snap::raw::Decoder::new()
        .decompress_vec(body)
        .map_err(|e| ExporterError::Encode(e.to_string()))?;
    Request::decode(raw.as_slice()).map_err(|e| ExporterError::Encode(e.to_string()))
}
