use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

/// Structured JSON logging on stdout. `RUST_LOG` controls the level
/// (default `info`).
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout).json())
        .init();
}

/// Same as `init_telemetry`, but tolerates an already-installed subscriber.
/// Integration tests call this once per spawned app.
pub fn try_init_telemetry() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
