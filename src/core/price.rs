//! Normalized price records and refresh bookkeeping

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A single normalized observation: epoch seconds and the closing price.
///
/// This is the only shape handed to the presentation layer. Records built by
/// the payload parser always satisfy `timestamp >= 0` and a finite `price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: i64,
    pub price: f64,
}

impl PriceRecord {
    pub fn new(timestamp: i64, price: f64) -> Self {
        PriceRecord { timestamp, price }
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }
}

impl Display for PriceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.observed_at() {
            Some(at) => write!(f, "{} {:.2}", at.to_rfc3339(), self.price),
            None => write!(f, "{} {:.2}", self.timestamp, self.price),
        }
    }
}

/// Returns the record treated as the most recent observation.
///
/// The provider is assumed to list observations newest first, so this is the
/// first element of the normalized sequence. Nothing in the provider contract
/// guarantees that ordering; it has only been observed.
pub fn latest_observation(records: &[PriceRecord]) -> Option<&PriceRecord> {
    records.first()
}

/// Bookkeeping that travels with the stored series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshState {
    /// Set while the controller is initializing (setup plus first fetch).
    pub is_refreshing: bool,
    /// Wall clock time of the last successful local refresh.
    pub last_local_refresh: Option<DateTime<Utc>>,
    /// Timestamp of the latest observation reported by the provider.
    pub last_observation_timestamp: Option<i64>,
}

impl RefreshState {
    pub fn last_observation_at(&self) -> Option<DateTime<Utc>> {
        self.last_observation_timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}
