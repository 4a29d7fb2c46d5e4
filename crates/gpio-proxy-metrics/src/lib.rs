//! Metrics infrastructure for the GPIO proxy client.
//!
//! This crate declares every metric the client emits as a structured
//! [`Metric`] constant, so names and labels are written down once. It
//! re-exports the `metrics` crate; without an installed recorder all calls
//! are no-ops.
//!
//! # Example
//!
//! ```rust
//! use gpio_proxy_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::new("10.0.0.13:5122").with_operation("set");
//! metrics::counter!(metric_defs::REQUESTS.name, labels.to_labels().as_slice()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use gpio_proxy_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const SENT: Metric = Metric::counter("gpio_proxy.sent")
///     .with_description("Datagrams sent")
///     .with_unit(Unit::Count)
///     .with_labels(&["peer"]);
///
/// assert_eq!(SENT.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name.
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// The unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers the description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the client.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every connection-scoped metric.
    pub const PEER_LABELS: &[&str] = &["peer"];

    /// Labels for per-operation breakdown.
    pub const OPERATION_LABELS: &[&str] = &["peer", "op"];

    /// Round trips started.
    pub const REQUESTS: Metric = Metric::counter("gpio_proxy.requests")
        .with_description("Request datagrams sent to the daemon")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Replies carrying a non-zero error code.
    pub const REMOTE_ERRORS: Metric = Metric::counter("gpio_proxy.remote_errors")
        .with_description("Replies with a non-zero error code")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Round trips that hit their deadline.
    pub const TIMEOUTS: Metric = Metric::counter("gpio_proxy.timeouts")
        .with_description("Round trips abandoned after the deadline")
        .with_unit(Unit::Count)
        .with_labels(OPERATION_LABELS);

    /// Datagrams thrown away because they could not be matched to the
    /// request in flight.
    pub const DISCARDED_DATAGRAMS: Metric = Metric::counter("gpio_proxy.discarded_datagrams")
        .with_description("Late or mismatched datagrams dropped")
        .with_unit(Unit::Count)
        .with_labels(PEER_LABELS);

    /// Round-trip time.
    pub const ROUND_TRIP_TIME: Metric = Metric::histogram("gpio_proxy.round_trip_us")
        .with_description("Time from send to matching reply")
        .with_unit(Unit::Microseconds)
        .with_labels(OPERATION_LABELS);

    /// Pins currently claimed through a pin manager.
    pub const CLAIMED_PINS: Metric = Metric::gauge("gpio_proxy.claimed_pins")
        .with_description("Pins currently claimed by this process")
        .with_unit(Unit::Count)
        .with_labels(PEER_LABELS);

    /// All metrics.
    pub const ALL: &[&Metric] = &[
        &REQUESTS,
        &REMOTE_ERRORS,
        &TIMEOUTS,
        &DISCARDED_DATAGRAMS,
        &ROUND_TRIP_TIME,
        &CLAIMED_PINS,
    ];
}

/// Labels identifying a connection and, optionally, an operation.
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Remote daemon address.
    pub peer: String,
    /// Operation name, if the metric is per operation.
    pub operation: Option<&'static str>,
}

impl MetricLabels {
    /// Creates labels for a connection.
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            operation: None,
        }
    }

    /// Adds the operation label.
    pub fn with_operation(&self, operation: &'static str) -> Self {
        Self {
            peer: self.peer.clone(),
            operation: Some(operation),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("peer", self.peer.clone())];
        if let Some(op) = self.operation {
            labels.push(("op", op.to_string()));
        }
        labels
    }
}

/// Describes all metrics. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus recorder serving `/metrics` on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
