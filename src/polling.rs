//! Refresh lifecycle: provider setup once, an immediate fetch, then a fetch on
//! every timer tick until the owner calls [`PollingHandle::stop`].

use crate::core::config::DEFAULT_REFRESH_INTERVAL_SECS;
use crate::core::error::Result;
use crate::core::payload::parse;
use crate::core::provider::ProviderClient;
use crate::store::{PriceSeriesStore, SeriesReader};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Active,
    Stopped,
}

/// Result of a fetch cycle that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Stored { records: usize },
    /// Another fetch was already in flight.
    Skipped,
    /// The controller was stopped; nothing was written.
    Discarded,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives `ProviderClient` -> `parse` -> `PriceSeriesStore`.
pub struct PollingController {
    provider: Arc<dyn ProviderClient>,
    store: Arc<PriceSeriesStore>,
    interval: Duration,
    in_flight: AtomicBool,
    state: watch::Sender<ControllerState>,
}

impl PollingController {
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Self::with_store(provider, Arc::new(PriceSeriesStore::new()))
    }

    pub fn with_store(provider: Arc<dyn ProviderClient>, store: Arc<PriceSeriesStore>) -> Self {
        let (state, _) = watch::channel(ControllerState::Uninitialized);
        Self {
            provider,
            store,
            interval: DEFAULT_REFRESH_INTERVAL,
            in_flight: AtomicBool::new(false),
            state,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("Ignoring zero refresh interval, keeping {:?}", self.interval);
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn store(&self) -> Arc<PriceSeriesStore> {
        Arc::clone(&self.store)
    }

    pub fn reader(&self) -> SeriesReader {
        SeriesReader::new(self.store())
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Runs one request-parse-store sequence.
    ///
    /// Errors leave the store untouched. A call made while another cycle is
    /// in flight returns `Skipped` instead of queueing.
    pub async fn fetch_cycle(&self) -> Result<FetchOutcome> {
        if self.store.is_closed() {
            debug!("Controller stopped, not fetching");
            return Ok(FetchOutcome::Discarded);
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Fetch already in flight, skipping");
            return Ok(FetchOutcome::Skipped);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let outcome = self.fetch_and_store().await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Fetch cycle failed, keeping previous series");
        }
        outcome
    }

    async fn fetch_and_store(&self) -> Result<FetchOutcome> {
        let raw = self.provider.get_latest_data().await?;
        let records = parse(&raw)?;
        let count = records.len();

        if self.store.replace(records, Utc::now()) {
            debug!(records = count, "Stored latest series");
            Ok(FetchOutcome::Stored { records: count })
        } else {
            debug!("Controller stopped, discarding fetched series");
            Ok(FetchOutcome::Discarded)
        }
    }

    // Stopped is terminal.
    fn transition(&self, next: ControllerState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == ControllerState::Stopped || *current == next {
                return false;
            }
            debug!("Controller {:?} -> {:?}", current, next);
            *current = next;
            true
        })
    }

    /// Starts the refresh lifecycle on the current tokio runtime.
    pub fn start(self) -> PollingHandle {
        let controller = Arc::new(self);
        controller.transition(ControllerState::Initializing);
        controller.store.set_refreshing(true);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(Arc::clone(&controller), shutdown_rx));

        PollingHandle {
            controller,
            shutdown,
            task: Some(task),
        }
    }
}

async fn run(controller: Arc<PollingController>, mut shutdown: watch::Receiver<bool>) {
    info!("Initializing provider");
    if let Err(e) = controller.provider.setup().await {
        warn!(error = %e, "Provider setup failed, fetching anyway");
    }
    // Failures are logged inside the cycle.
    let _ = controller.fetch_cycle().await;
    controller.store.set_refreshing(false);

    if !controller.transition(ControllerState::Active) {
        debug!("Stopped during initialization");
        return;
    }

    let period = controller.interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval = ?period, "Polling started");

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let _ = controller.fetch_cycle().await;
            }
        }
    }
    info!("Polling loop exited");
}

/// Owned handle to a running controller.
///
/// Dropping the handle ends the polling loop, but only [`PollingHandle::stop`]
/// guarantees that an in-flight fetch is not stored.
#[must_use = "polling runs until `stop` is called"]
pub struct PollingHandle {
    controller: Arc<PollingController>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollingHandle {
    pub fn reader(&self) -> SeriesReader {
        self.controller.reader()
    }

    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ControllerState> {
        self.controller.state.subscribe()
    }

    /// Fetches immediately, outside the timer.
    pub async fn refresh_now(&self) -> Result<FetchOutcome> {
        self.controller.fetch_cycle().await
    }

    /// Cancels the schedule. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.controller.store.close();
        self.controller.transition(ControllerState::Stopped);
        self.shutdown.send_replace(true);

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!("Polling task still busy after {:?}, aborting", SHUTDOWN_GRACE);
                task.abort();
            }
            info!("Polling controller stopped");
        }
    }
}
