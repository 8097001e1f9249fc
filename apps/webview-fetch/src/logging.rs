use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    /// Show warnings only; progress goes through `println!`.
    #[default]
    Default,
    /// Show debug messages from the installer crates.
    Verbose,
}

/// Configure `tracing` for the given [`Level`]. `RUST_LOG` overrides the
/// default filter in both modes. Log output always goes to stderr.
pub(crate) fn setup_logging(level: Level) {
    let filter = match level {
        Level::Default => EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy(),
        Level::Verbose => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("webview_runtime=debug,webview_fetch=debug")),
    };

    let format = tracing_subscriber::fmt::layer()
        .with_target(level == Level::Verbose)
        .with_writer(std::io::stderr);

    match level {
        Level::Default => tracing_subscriber::registry()
            .with(filter)
            .with(format.without_time())
            .init(),
        Level::Verbose => tracing_subscriber::registry()
            .with(filter)
            .with(format)
            .init(),
    }
}
