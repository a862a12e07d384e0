use tracing_subscriber::EnvFilter;

/// Env var consulted first for the log filter; `RUST_LOG` is the fallback.
pub const LOG_ENV: &str = "REGISTRARD_LOG";

/// Installs the global subscriber. Output goes to stderr because stdout
/// carries the protocol. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
