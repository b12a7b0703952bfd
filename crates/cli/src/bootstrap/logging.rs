use resolv_send_domain::Config;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber on stderr.
///
/// RUST_LOG takes precedence over the configured level, e.g.
///   RUST_LOG=resolv_send_infrastructure=trace
pub fn init_logging(config: &Config) {
    let directive = filter_directive(config);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.ok();
}

/// `options.debug` raises the level to at least `debug`.
fn filter_directive(config: &Config) -> &str {
    let level = config.logging.level.as_str();
    if config.resolver.options.debug && !level.eq_ignore_ascii_case("trace") {
        "debug"
    } else {
        level
    }
}
