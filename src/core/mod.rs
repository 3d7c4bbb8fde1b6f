//! Core abstractions for the price feed

pub mod config;
pub mod error;
pub mod log;
pub mod payload;
pub mod price;
pub mod provider;

// Re-export main types for cleaner imports
pub use error::FeedError;
pub use payload::{RawPayload, parse};
pub use price::{PriceRecord, RefreshState, latest_observation};
pub use provider::ProviderClient;
