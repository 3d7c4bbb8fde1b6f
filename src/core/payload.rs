//! Provider payload shapes and the parser that normalizes them.
//!
//! The provider answers either with one JSON-encoded array of observations or
//! with an array of such strings (batch-of-batches). Each observation is a
//! loosely typed array `[timestamp, open, high, low, close, ...]`; only the
//! timestamp and the close survive normalization.

use crate::core::error::{FeedError, Result};
use crate::core::price::PriceRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Minimum number of fields in a wire observation.
pub const MIN_OBSERVATION_FIELDS: usize = 5;
const TIMESTAMP_FIELD: usize = 0;
const CLOSE_FIELD: usize = 4;
/// Largest integer an f64 carries without loss.
const MAX_SAFE_TIMESTAMP: i64 = 1 << 53;

/// Raw response from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    /// A single JSON-encoded array of observations.
    Single(String),
    /// JSON-encoded arrays of observations, flattened in order.
    Batches(Vec<String>),
}

impl RawPayload {
    /// Sniffs the shape of a response body.
    ///
    /// A JSON string becomes `Single` with the decoded string, an array of
    /// strings becomes `Batches`, and any other JSON array is the observation
    /// list itself and is kept verbatim as `Single`.
    pub fn from_body(body: &str) -> Result<Self> {
        match serde_json::from_str::<RawPayload>(body) {
            Ok(payload) => Ok(payload),
            Err(_) if body.trim_start().starts_with('[') => {
                Ok(RawPayload::Single(body.to_string()))
            }
            Err(e) => Err(FeedError::MalformedPayload(format!(
                "unrecognized payload shape: {e}"
            ))),
        }
    }
}

/// Normalizes a raw payload into price records, preserving input order.
///
/// Fails fast: one bad batch or observation rejects the whole payload.
pub fn parse(raw: &RawPayload) -> Result<Vec<PriceRecord>> {
    let observations = match raw {
        RawPayload::Single(text) => decode_batch(text)?,
        RawPayload::Batches(batches) => {
            let mut flat = Vec::new();
            for text in batches {
                flat.extend(decode_batch(text)?);
            }
            flat
        }
    };
    debug!(count = observations.len(), "Decoded observations");

    observations
        .iter()
        .enumerate()
        .map(|(index, observation)| to_record(index, observation))
        .collect()
}

fn decode_batch(text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| FeedError::MalformedPayload(format!("invalid JSON: {e}")))?;
    match value {
        Value::Array(items) => Ok(items),
        other => Err(FeedError::MalformedPayload(format!(
            "expected a JSON array, found {}",
            kind_of(&other)
        ))),
    }
}

fn to_record(index: usize, observation: &Value) -> Result<PriceRecord> {
    let fields = observation.as_array().ok_or_else(|| {
        FeedError::invalid(
            index,
            format!("expected an array, found {}", kind_of(observation)),
        )
    })?;
    if fields.len() < MIN_OBSERVATION_FIELDS {
        return Err(FeedError::invalid(
            index,
            format!(
                "expected at least {MIN_OBSERVATION_FIELDS} fields, found {}",
                fields.len()
            ),
        ));
    }

    let timestamp = timestamp_field(&fields[TIMESTAMP_FIELD]).ok_or_else(|| {
        FeedError::invalid(
            index,
            format!("timestamp {} is not a whole non-negative number", fields[TIMESTAMP_FIELD]),
        )
    })?;
    let price = numeric_field(&fields[CLOSE_FIELD])
        .filter(|p| p.is_finite())
        .ok_or_else(|| {
            FeedError::invalid(
                index,
                format!("close {} is not a finite number", fields[CLOSE_FIELD]),
            )
        })?;

    Ok(PriceRecord { timestamp, price })
}

fn numeric_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn timestamp_field(value: &Value) -> Option<i64> {
    let ts = match value {
        Value::Number(n) => match n.as_i64() {
            Some(ts) => ts,
            // Float literals above 2^53 may already have been rounded.
            None => n
                .as_f64()
                .filter(|ts| ts.fract() == 0.0 && ts.abs() < MAX_SAFE_TIMESTAMP as f64)
                .map(|ts| ts as i64)?,
        },
        Value::String(s) => integer_string(s)?,
        _ => return None,
    };
    (0..=MAX_SAFE_TIMESTAMP).contains(&ts).then_some(ts)
}

/// Parses `"123"` or `"123.000"` exactly, without going through f64.
fn integer_string(s: &str) -> Option<i64> {
    let s = s.trim();
    let whole = match s.split_once('.') {
        Some((whole, frac)) if frac.bytes().all(|b| b == b'0') => whole,
        Some(_) => return None,
        None => s,
    };
    whole.parse::<i64>().ok()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
