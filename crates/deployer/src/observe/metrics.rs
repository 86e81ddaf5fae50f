/// Metrics for the deployer.
#[derive(Debug, Clone, prometheus_metric_storage::MetricStorage)]
pub struct Metrics {
    /// Outcomes of deployments.
    #[metric(labels("network", "result"))]
    pub deployments: prometheus::IntCounterVec,
    /// Time from broadcast until the deployment was confirmed.
    #[metric(
        labels("network"),
        buckets(1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0)
    )]
    pub confirmation_seconds: prometheus::HistogramVec,
}

/// Setup the metrics registry.
pub fn init() {
    ::observe::metrics::setup_registry_reentrant(Some("deployer".to_owned()));
}

/// Get the metrics instance.
pub fn get() -> &'static Metrics {
    Metrics::instance(::observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}
