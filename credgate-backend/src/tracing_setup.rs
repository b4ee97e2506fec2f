/// Initialize tracing from configuration.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn install_tracing_from_config(cfg: &credgate_config::LoggingConfig) {
    use tracing_subscriber::fmt::time::ChronoUtc;
    use tracing_subscriber::EnvFilter;

    let env_filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let env_filter = EnvFilter::new(&env_filter_str);

    if cfg.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
