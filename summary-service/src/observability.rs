use tracing_subscriber::EnvFilter;

/// `RUST_LOG` takes the whole filter when set; otherwise default to info for
/// this service and its client crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,summary_service=info,solar_client=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
