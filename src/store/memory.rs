use crate::core::price::{PriceRecord, RefreshState, latest_observation};
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

struct SeriesEntry {
    records: Arc<Vec<PriceRecord>>,
    state: RefreshState,
    closed: bool,
}

/// In-memory holder of the latest normalized series and its refresh state.
///
/// Records and state share one lock, so a reader never sees a series paired
/// with a state from a different refresh. Once closed, writes are ignored.
pub struct PriceSeriesStore {
    inner: RwLock<SeriesEntry>,
}

impl PriceSeriesStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SeriesEntry {
                records: Arc::new(Vec::new()),
                state: RefreshState::default(),
                closed: false,
            }),
        }
    }

    fn read_entry(&self) -> RwLockReadGuard<'_, SeriesEntry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entry(&self) -> RwLockWriteGuard<'_, SeriesEntry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the stored series wholesale.
    ///
    /// `observed_at` becomes the last local refresh time. The last observation
    /// timestamp follows the first record; an empty series keeps the previous
    /// one. Returns `false` without touching anything once the store is closed.
    pub fn replace(&self, records: Vec<PriceRecord>, observed_at: DateTime<Utc>) -> bool {
        let mut entry = self.write_entry();
        if entry.closed {
            debug!("Store closed, dropping {} records", records.len());
            return false;
        }
        if let Some(latest) = latest_observation(&records) {
            entry.state.last_observation_timestamp = Some(latest.timestamp);
        }
        entry.state.last_local_refresh = Some(observed_at);
        debug!("Store REPLACE with {} records", records.len());
        entry.records = Arc::new(records);
        true
    }

    pub fn read(&self) -> (Arc<Vec<PriceRecord>>, RefreshState) {
        let entry = self.read_entry();
        (Arc::clone(&entry.records), entry.state.clone())
    }

    pub(crate) fn set_refreshing(&self, refreshing: bool) {
        let mut entry = self.write_entry();
        if !entry.closed {
            entry.state.is_refreshing = refreshing;
        }
    }

    /// Stops accepting writes. Idempotent.
    pub(crate) fn close(&self) {
        let mut entry = self.write_entry();
        if !entry.closed {
            debug!("Store CLOSE");
            entry.closed = true;
            entry.state.is_refreshing = false;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.read_entry().closed
    }
}

impl Default for PriceSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a [`PriceSeriesStore`] handed to the presentation layer.
#[derive(Clone)]
pub struct SeriesReader {
    store: Arc<PriceSeriesStore>,
}

impl SeriesReader {
    pub fn new(store: Arc<PriceSeriesStore>) -> Self {
        Self { store }
    }

    pub fn read(&self) -> (Arc<Vec<PriceRecord>>, RefreshState) {
        self.store.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_store_starts_empty() {
        let store = PriceSeriesStore::new();
        let (records, state) = store.read();
        assert!(records.is_empty());
        assert_eq!(state, RefreshState::default());
        assert!(!store.is_closed());
    }

    #[test]
    fn test_replace_updates_records_and_state_together() {
        let store = PriceSeriesStore::new();
        let records = vec![
            PriceRecord::new(1_700_000_060, 106.0),
            PriceRecord::new(1_700_000_000, 105.0),
        ];
        assert!(store.replace(records.clone(), at(1_800_000_000)));

        let (stored, state) = store.read();
        assert_eq!(*stored, records);
        assert_eq!(state.last_observation_timestamp, Some(1_700_000_060));
        assert_eq!(state.last_local_refresh, Some(at(1_800_000_000)));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let store = PriceSeriesStore::new();
        store.replace(
            vec![
                PriceRecord::new(1_700_000_060, 106.0),
                PriceRecord::new(1_700_000_000, 105.0),
            ],
            at(1),
        );
        store.replace(vec![PriceRecord::new(1_700_000_120, 107.0)], at(2));

        let (stored, state) = store.read();
        assert_eq!(*stored, vec![PriceRecord::new(1_700_000_120, 107.0)]);
        assert_eq!(state.last_observation_timestamp, Some(1_700_000_120));
    }

    #[test]
    fn test_zero_timestamp_is_recorded() {
        let store = PriceSeriesStore::new();
        store.replace(vec![PriceRecord::new(0, 10.0)], at(1));

        let (stored, state) = store.read();
        assert_eq!(*stored, vec![PriceRecord::new(0, 10.0)]);
        assert_eq!(state.last_observation_timestamp, Some(0));
    }

    #[test]
    fn test_replace_with_empty_series_keeps_last_observation() {
        let store = PriceSeriesStore::new();
        store.replace(vec![PriceRecord::new(1_700_000_000, 105.0)], at(1));
        store.replace(Vec::new(), at(2));

        let (stored, state) = store.read();
        assert!(stored.is_empty());
        assert_eq!(state.last_observation_timestamp, Some(1_700_000_000));
        assert_eq!(state.last_local_refresh, Some(at(2)));
    }

    #[test]
    fn test_earlier_snapshot_is_unaffected_by_replace() {
        let store = PriceSeriesStore::new();
        store.replace(vec![PriceRecord::new(1_700_000_000, 105.0)], at(1));
        let (before, before_state) = store.read();

        store.replace(vec![PriceRecord::new(1_700_000_060, 106.0)], at(2));
        assert_eq!(*before, vec![PriceRecord::new(1_700_000_000, 105.0)]);
        assert_eq!(before_state.last_local_refresh, Some(at(1)));
    }

    #[test]
    fn test_closed_store_ignores_writes() {
        let store = PriceSeriesStore::new();
        store.replace(vec![PriceRecord::new(1_700_000_000, 105.0)], at(1));
        store.set_refreshing(true);
        store.close();
        store.close();

        assert!(store.is_closed());
        assert!(!store.replace(vec![PriceRecord::new(1_700_000_060, 106.0)], at(2)));
        store.set_refreshing(true);

        let (stored, state) = store.read();
        assert_eq!(*stored, vec![PriceRecord::new(1_700_000_000, 105.0)]);
        assert_eq!(state.last_local_refresh, Some(at(1)));
        assert!(!state.is_refreshing);
    }

    #[test]
    fn test_reader_sees_store_updates() {
        let store = Arc::new(PriceSeriesStore::new());
        let reader = SeriesReader::new(Arc::clone(&store));
        store.replace(vec![PriceRecord::new(1_700_000_000, 105.0)], at(1));

        let (records, state) = reader.read();
        assert_eq!(records.len(), 1);
        assert_eq!(state.last_observation_timestamp, Some(1_700_000_000));
    }
}
