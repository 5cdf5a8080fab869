/// Install the process-wide `tracing` subscriber.
///
/// Reads `RUST_LOG` when set, otherwise logs this crate at debug and everything
/// else at info. Called from `CallApp::new`; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callwire_core=debug,info".into()),
        )
        .with_target(true)
        .try_init();
}
