use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `ordena=info`. Debug builds
/// log human-readable lines; release builds emit JSON for log shippers.
///
/// Safe to call more than once: if a subscriber is already installed the
/// call is a no-op, so embedding applications and test harnesses can both
/// initialize without coordinating.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ordena=info"));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if cfg!(debug_assertions) {
        fmt.try_init()
    } else {
        fmt.json().try_init()
    };
    // Err means a subscriber is already set; keep it.
    result.ok();
}
