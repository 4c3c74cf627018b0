use super::blockmap::BlockMap;
use super::snapshot::{unix_now, StoredBlocklistConfiguration};
use super::traits::{BlockListStore, SourceFetcher};
use crate::error::{BlocklistError, Result};
use crate::stats::StatsCollector;
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdaterState {
    Idle,
    Fetching,
    Merging,
    Publishing,
}

impl UpdaterState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Fetching,
            2 => Self::Merging,
            3 => Self::Publishing,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdaterOptions {
    pub sources: Vec<String>,
    /// Refresh interval, also the maximum snapshot age.
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub concurrent_downloads: usize,
    /// Periodic refreshes. When off, only startup and explicit triggers refresh.
    pub auto_update: bool,
}

/// Result of one successful refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub entries: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub persisted: bool,
    pub elapsed: Duration,
}

/// Owns the fetch → merge → publish cycle.
///
/// At most one cycle runs at a time. Triggers that arrive while a cycle is
/// running are dropped, and at most one trigger is ever pending.
pub struct BlocklistUpdater {
    options: UpdaterOptions,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn BlockListStore>,
    stats: Option<Arc<StatsCollector>>,
    state: AtomicU8,
    in_flight: AtomicBool,
    trigger_tx: mpsc::Sender<()>,
}

/// Resets the single-flight flag and state when a cycle ends, however it ends.
struct CycleGuard<'a>(&'a BlocklistUpdater);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.set_state(UpdaterState::Idle);
        self.0.in_flight.store(false, Ordering::Release);
    }
}

impl BlocklistUpdater {
    /// Builds the updater and the receiving end of its trigger channel, which
    /// is handed to [`BlocklistUpdater::run`].
    pub fn new(
        options: UpdaterOptions,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn BlockListStore>,
        stats: Option<Arc<StatsCollector>>,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let updater = Arc::new(Self {
            options,
            fetcher,
            store,
            stats,
            state: AtomicU8::new(UpdaterState::Idle as u8),
            in_flight: AtomicBool::new(false),
            trigger_tx,
        });
        (updater, trigger_rx)
    }

    pub fn state(&self) -> UpdaterState {
        UpdaterState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn sources(&self) -> &[String] {
        &self.options.sources
    }

    fn set_state(&self, state: UpdaterState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Requests a refresh. Returns false when the request was coalesced into
    /// a running or already pending cycle.
    pub fn trigger(&self) -> bool {
        if self.is_refreshing() {
            debug!("Refresh already running, trigger coalesced");
            return false;
        }
        match self.trigger_tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("Refresh already pending, trigger coalesced");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("Blocklist updater is not running, trigger ignored");
                false
            }
        }
    }

    /// Restores the stored snapshot and reports whether a refresh is due now.
    pub async fn warm_start(&self) -> bool {
        match self.store.init().await {
            Some(snapshot) => {
                if snapshot.blocklists != self.options.sources {
                    info!("Configured blocklists changed since last update, refreshing");
                    true
                } else if snapshot.needs_update(self.options.interval) {
                    info!(
                        "Stored blocklist from {} is older than {:?}, refreshing",
                        snapshot.update_timestamp, self.options.interval
                    );
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    }

    /// Runs one refresh cycle.
    ///
    /// Source failures are logged and skipped. If every source fails the
    /// cycle is aborted and the active blocklist stays in place.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BlocklistError::RefreshInProgress);
        }
        let _guard = CycleGuard(self);
        let start = Instant::now();

        let result = self.run_cycle(start).await;
        if let Some(stats) = &self.stats {
            stats.record_refresh(result.is_ok());
        }
        result
    }

    async fn run_cycle(&self, start: Instant) -> Result<RefreshReport> {
        info!("Refreshing {} blocklist sources...", self.options.sources.len());
        self.set_state(UpdaterState::Fetching);

        let fetch_timeout = self.options.fetch_timeout;
        let fetcher = self.fetcher.clone();
        let tasks = self
            .options
            .sources
            .clone()
            .into_iter()
            .enumerate()
            .map(move |(idx, locator)| {
                let fetcher = fetcher.clone();
                async move {
                    let result =
                        match tokio::time::timeout(fetch_timeout, fetcher.fetch(&locator)).await {
                            Ok(r) => r,
                            Err(_) => Err(BlocklistError::source_fetch(
                                locator,
                                format!("timed out after {:?}", fetch_timeout),
                            )),
                        };
                    (idx, result)
                }
            });

        let mut results: Vec<(usize, Result<Vec<Box<str>>>)> = stream::iter(tasks)
            .buffer_unordered(self.options.concurrent_downloads.max(1))
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);

        let attempted = results.len();
        let mut fetched = Vec::with_capacity(attempted);
        for (_, result) in results {
            match result {
                Ok(entries) => fetched.push(entries),
                Err(e) => warn!("Skipping source for this cycle: {}", e),
            }
        }

        if fetched.is_empty() {
            let err = BlocklistError::AllSourcesFailed { attempted };
            warn!("{}; keeping the active blocklist", err);
            return Err(err);
        }
        let succeeded = fetched.len();

        self.set_state(UpdaterState::Merging);
        let raw: usize = fetched.iter().map(Vec::len).sum();
        let map = tokio::task::spawn_blocking(move || {
            BlockMap::from_entries(fetched.into_iter().flatten())
        })
        .await
        .map_err(|e| BlocklistError::io("blocklist merge task failed", std::io::Error::other(e)))?;
        let entries = map.len();
        let snapshot = StoredBlocklistConfiguration::new(
            unix_now(),
            self.options.sources.clone(),
            Arc::new(map),
        );

        self.set_state(UpdaterState::Publishing);
        let persisted = match self.store.publish(snapshot).await {
            Ok(()) => true,
            Err(e) => {
                error!("Blocklist published but not persisted: {}", e);
                false
            }
        };

        let report = RefreshReport {
            entries,
            succeeded,
            failed: attempted - succeeded,
            persisted,
            elapsed: start.elapsed(),
        };
        info!(
            "Blocklist refresh complete: {} domains ({} raw, {}/{} sources) in {:?}",
            entries, raw, succeeded, attempted, report.elapsed
        );
        Ok(report)
    }

    /// Background loop: refreshes on every interval tick and on triggers.
    pub async fn run(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>, refresh_now: bool) {
        if refresh_now {
            let _ = self.refresh().await;
        }

        let mut interval = tokio::time::interval(self.options.interval);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick(), if self.options.auto_update => {
                    info!("Scheduled blocklist update...");
                }
                msg = trigger_rx.recv() => {
                    if msg.is_none() {
                        debug!("Trigger channel closed, stopping updater");
                        return;
                    }
                    info!("Forced blocklist update triggered...");
                    interval.reset();
                }
            }
            match self.refresh().await {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    debug!("Refresh cycle ended without publishing: {}", e);
                }
                Err(e) => error!("Refresh cycle failed: {}", e),
            }
        }
    }
}
