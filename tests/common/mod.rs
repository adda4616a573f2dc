use tracing_subscriber::EnvFilter;

/// Installs a process-wide subscriber the first time it's called in a test
/// binary; later calls are no-ops. Run with `RUST_LOG=info` (or `debug`) to
/// see the `registry.register`/`gateway.dispatch`/`workflow.run` spans.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
