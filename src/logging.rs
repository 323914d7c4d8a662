use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` wins over `loglevel`.
///
/// Workers pass `to_stderr = true`: their stdout carries the control channel.
pub fn init_tracing(loglevel: &str, to_stderr: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(loglevel));
    let registry = tracing_subscriber::registry().with(env_filter);

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_level(true)
        .with_target(false);

    if to_stderr {
        registry.with(layer.with_writer(std::io::stderr)).init();
    } else {
        registry.with(layer).init();
    }
}
