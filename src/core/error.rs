//! Error taxonomy for the fetch-normalize-refresh cycle.

use thiserror::Error;

/// Errors produced while talking to the provider or normalizing its payload.
///
/// None of these are fatal to a running controller: a failed setup is logged
/// and fetching proceeds, every other variant aborts a single fetch cycle and
/// leaves the previously stored series in place.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Provider setup failed: {0}")]
    Setup(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid observation at index {index}: {reason}")]
    InvalidObservation { index: usize, reason: String },
}

impl FeedError {
    pub(crate) fn invalid(index: usize, reason: impl Into<String>) -> Self {
        FeedError::InvalidObservation {
            index,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
