//! Prometheus metrics for synchronization and search.
//!
//! # Example
//! ```no_run
//! use webshop_search::metrics;
//!
//! metrics::init_metrics().ok();
//! metrics::SYNC_DOCUMENTS_TOTAL.with_label_values(&["indexed"]).inc();
//! println!("{}", metrics::gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "webshop_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Documents handled by the synchronizer
    ///
    /// Labels: outcome (indexed, deleted, rejected, serialize_failed)
    pub static ref SYNC_DOCUMENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("sync_documents_total", "Documents handled by the synchronizer")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SYNC_DOCUMENTS_TOTAL metric");

    /// Batches processed by the synchronizer
    ///
    /// Labels: outcome (confirmed, failed)
    pub static ref SYNC_BATCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("sync_batches_total", "Batches processed by the synchronizer")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SYNC_BATCHES_TOTAL metric");

    /// Entries pending in the backlog after the last synchronizer run
    pub static ref BACKLOG_PENDING: Gauge = Gauge::with_opts(
        Opts::new("backlog_pending", "Entries pending in the index backlog")
            .namespace(NAMESPACE)
    ).expect("Failed to create BACKLOG_PENDING metric");

    /// Search query execution time in seconds
    pub static ref QUERY_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("query_duration_seconds", "Search query execution time in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("Failed to create QUERY_DURATION_SECONDS metric");
}

/// Register all metrics with the registry.
///
/// Fails when called twice, since the metrics are already registered.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(SYNC_DOCUMENTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SYNC_BATCHES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BACKLOG_PENDING.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(QUERY_DURATION_SECONDS.clone()))?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Metrics in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
