use {
    crate::{config::Config, panic_hook},
    std::{io::IsTerminal, sync::Once},
    time::macros::format_description,
    tracing_subscriber::{EnvFilter, Layer, Registry, fmt::time::UtcTime, prelude::*},
};

/// Initializes the tracing setup of the binary.
/// `env_filter` has similar syntax to env_logger. It is documented at
/// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
///
/// Every event is written to stderr; stdout carries the command's result.
///
/// # Panics
///
/// Panics if a global subscriber was already installed.
pub fn initialize(config: &Config) {
    subscriber(config).init();
    panic_hook::install();
}

/// Like [`initialize`], but can be called multiple times in a row. Later calls
/// are ignored.
///
/// Useful for tests.
pub fn initialize_reentrant(env_filter: &str) {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        // Fails if some other test utility already owns the global subscriber,
        // in which case its output is just as good.
        let _ = subscriber(&Config::default().with_env_filter(env_filter)).try_init();
        panic_hook::install();
    });
}

fn subscriber(config: &Config) -> impl ::tracing::Subscriber + Send + Sync + 'static {
    let timer = UtcTime::new(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ));
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.use_json_format {
        tracing_subscriber::fmt::layer()
            .json()
            .with_timer(timer)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .boxed()
    };

    tracing_subscriber::registry().with(fmt_layer.with_filter(EnvFilter::new(&config.env_filter)))
}
