// Logging initialization for hosts embedding the feed
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt, util::TryInitError,
};

/// Installs the global subscriber, failing if one is already set.
pub fn try_init_logging(verbose: bool) -> Result<(), TryInitError> {
    let (level_filter, level) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::INFO, "info")
    };
    let app_filter = Targets::new().with_target("oraclefeed", level_filter);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(app_filter)
        .with(env_filter)
        .try_init()
}

pub fn init_logging(verbose: bool) {
    if let Err(e) = try_init_logging(verbose) {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}
