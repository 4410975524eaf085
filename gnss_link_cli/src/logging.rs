use tracing_subscriber::EnvFilter;

/// Logs go to stderr so replies on stdout stay scriptable. `RUST_LOG` wins over `--debug`.
pub fn initialize(debug: bool) {
    let default = if debug {
        "info,gnss_link=debug,gnss_link_cli=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .init();
}
