use {prometheus::Encoder, std::sync::OnceLock};

/// Global metrics registry used by all components.
static REGISTRY: OnceLock<prometheus_metric_storage::StorageRegistry> = OnceLock::new();

/// Configure the global metrics registry with a common prefix for all metric
/// names. Later calls, and calls made after the registry was first used, are
/// ignored.
pub fn setup_registry_reentrant(prefix: Option<String>) {
    let registry = match prometheus::Registry::new_custom(prefix, None) {
        Ok(registry) => registry,
        Err(err) => {
            tracing::warn!(?err, "invalid metrics registry configuration");
            return;
        }
    };
    let storage_registry = prometheus_metric_storage::StorageRegistry::new(registry);
    REGISTRY.set(storage_registry).ok();
}

/// Get the global instance of the metrics registry.
pub fn get_registry() -> &'static prometheus::Registry {
    get_storage_registry().registry()
}

/// Get the global instance of the metric storage registry.
///
/// Falls back to an unprefixed registry if [`setup_registry_reentrant`] was
/// never called, which keeps unit tests free of setup boilerplate.
pub fn get_storage_registry() -> &'static prometheus_metric_storage::StorageRegistry {
    REGISTRY.get_or_init(prometheus_metric_storage::StorageRegistry::default)
}

/// Renders all metrics of the registry in the prometheus text format.
pub fn encode(registry: &prometheus::Registry) -> Result<String, prometheus::Error> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
