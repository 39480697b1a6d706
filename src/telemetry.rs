use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the process-wide subscriber. Call once from the embedding
/// binary; respects `RUST_LOG`, defaulting to info.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
