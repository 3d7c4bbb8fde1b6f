pub mod core;
pub mod polling;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::polling::{PollingController, PollingHandle};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Builds the HTTP provider from `config` and starts polling it.
///
/// Must be called from within a tokio runtime. The returned handle owns the
/// schedule; call [`PollingHandle::stop`] to tear it down.
pub fn watch(config: &AppConfig) -> Result<PollingHandle> {
    config.validate().context("Invalid configuration")?;
    debug!("Starting feed with config: {config:#?}");

    let provider = providers::HttpProviderClient::new(&config.provider)
        .context("Failed to build provider client")?;

    info!(
        base_url = %config.provider.base_url,
        interval_secs = config.refresh_interval_secs,
        "Price feed starting..."
    );
    Ok(PollingController::new(Arc::new(provider))
        .with_interval(config.refresh_interval())
        .start())
}
