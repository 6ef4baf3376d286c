use std::sync::Once;

static INIT: Once = Once::new();

/// Route library log events to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "tinymap=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}
