use crate::core::error::Result;
use crate::core::payload::RawPayload;
use async_trait::async_trait;

/// The remote source of price observations.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// One-time initialization handshake. Failures are reported, not fatal.
    async fn setup(&self) -> Result<()>;

    async fn get_latest_data(&self) -> Result<RawPayload>;
}
