//! Batch download orchestration.
//!
//! A batch walks a date range (outer) and the subscribed channels
//! (inner) on a dedicated tokio task, skipping units the file store
//! already has, fetching and write-through-storing the rest. Progress
//! and the state machine (`Idle -> Connecting -> Downloading ->
//! Disconnecting -> Idle`, with `Cancelling` reachable from
//! `Downloading`) are published through a watch channel.
//!
//! Failure policy: the first error of the batch is retained and
//! returned, every later one is logged and discarded, and the loop
//! always keeps going: one broken channel or day must not abort the
//! acquisition of the rest.

use crate::{Guide, GuideError, GuideEvent, Result};
use epgmodel::{Channel, Date};
use epgstore::StoreError;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Day counts beyond the date type's range saturate instead of
/// wrapping negative.
fn clamp_days(days_to_include: u32) -> i32 {
    i32::try_from(days_to_include).unwrap_or(i32::MAX)
}

/// Where the orchestrator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadState {
    #[default]
    Idle,
    Connecting,
    Downloading,
    Cancelling,
    Disconnecting,
}

/// Progress snapshot, published after every attempted unit.
///
/// `done` counts units attempted (hit, fetched or failed alike) and
/// increases monotonically up to `total`.
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    pub state: DownloadState,
    pub done: usize,
    pub total: usize,
}

/// Outcome of a finished batch.
#[derive(Debug)]
pub struct BatchResult {
    /// True when no unit failed (cancellation alone does not clear it).
    pub succeeded: bool,
    /// The first error encountered, if any; later ones were logged
    /// and discarded.
    pub first_error: Option<GuideError>,
    /// Units actually fetched and stored.
    pub fetched: usize,
    /// Units skipped because the store already had them.
    pub skipped: usize,
    /// Total units in the batch.
    pub total: usize,
    /// True when the batch stopped early on request.
    pub cancelled: bool,
}

/// Handle on a running batch.
pub struct BatchHandle {
    progress: watch::Receiver<BatchProgress>,
    join: JoinHandle<BatchResult>,
    guide: Guide,
}

impl BatchHandle {
    /// Watch receiver mirroring the batch state and unit counts.
    pub fn progress(&self) -> watch::Receiver<BatchProgress> {
        self.progress.clone()
    }

    /// Requests cooperative cancellation; the loop stops before the
    /// next unit. Already-completed units stay cached.
    pub fn cancel(&self) {
        self.guide.stop_batch();
    }

    /// Waits for the batch to finish and returns its result.
    pub async fn wait(self) -> Result<BatchResult> {
        self.join
            .await
            .map_err(|err| GuideError::Other(anyhow::anyhow!("batch task failed: {err}")))
    }
}

impl Guide {
    /// True while a batch owns the download loop.
    pub fn is_downloading(&self) -> bool {
        self.batch_flag().load(Ordering::SeqCst)
    }

    /// Requests cooperative cancellation of the running batch, if any.
    pub fn stop_batch(&self) {
        self.cancel_flag().store(true, Ordering::SeqCst);
    }

    /// Starts a batch download over `[today - 1, today +
    /// days_to_include]` for every subscribed channel.
    ///
    /// Yesterday is always included to smooth over timezone and
    /// midnight edge effects. Only one batch may be in flight;
    /// a concurrent request is rejected, never interleaved.
    ///
    /// Must be called from within a tokio runtime: the batch runs on
    /// its own spawned task so the caller is never blocked.
    pub fn start_batch(&self, days_to_include: u32) -> Result<BatchHandle> {
        if self
            .batch_flag()
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GuideError::BatchAlreadyRunning);
        }
        self.cancel_flag().store(false, Ordering::SeqCst);

        let channels = self.subscribed_channels();
        let today = Date::today();
        let dates: Vec<Date> = (-1..=clamp_days(days_to_include))
            .map(|offset| today.add_days(offset))
            .collect();
        let total = dates.len() * channels.len();
        info!(days = dates.len(), channels = channels.len(), total, "Starting batch download");

        let (tx, rx) = watch::channel(BatchProgress {
            state: DownloadState::Connecting,
            done: 0,
            total,
        });
        let guide = self.clone();
        let join = tokio::spawn(async move { guide.run_batch(dates, channels, tx).await });

        Ok(BatchHandle {
            progress: rx,
            join,
            guide: self.clone(),
        })
    }

    async fn run_batch(
        &self,
        dates: Vec<Date>,
        channels: Vec<Channel>,
        tx: watch::Sender<BatchProgress>,
    ) -> BatchResult {
        let total = dates.len() * channels.len();
        let mut progress = BatchProgress {
            state: DownloadState::Connecting,
            done: 0,
            total,
        };

        // When the application is already in persistent online mode
        // the sources are connected; nesting another bracket would
        // violate their idempotence contract needlessly.
        let bracket = !self.is_online();
        if bracket {
            let _ = tx.send(progress.clone());
            self.inner_registry().connect_all().await;
        }

        progress.state = DownloadState::Downloading;
        let _ = tx.send(progress.clone());

        let mut first_error: Option<GuideError> = None;
        let mut fetched = 0;
        let mut skipped = 0;
        let mut cancelled = false;
        let mut touched: HashSet<Date> = HashSet::new();

        'batch: for date in &dates {
            for channel in &channels {
                // Cooperative cancellation, checked between units only
                if self.cancel_flag().load(Ordering::SeqCst) {
                    cancelled = true;
                    progress.state = DownloadState::Cancelling;
                    let _ = tx.send(progress.clone());
                    break 'batch;
                }

                if self.inner_store().exists(channel, *date) {
                    skipped += 1;
                } else {
                    match self.fetch_one(channel, *date).await {
                        Ok(_) => {
                            fetched += 1;
                            touched.insert(*date);
                        }
                        Err(err) => {
                            match &err {
                                GuideError::Store(StoreError::PersistFailed { .. }) => {
                                    // Local environment problem, likely to
                                    // recur for every later unit
                                    error!(
                                        channel = %channel.id(),
                                        date = %date,
                                        error = %err,
                                        "Failed to persist fetched listings"
                                    );
                                }
                                _ => {
                                    warn!(
                                        channel = %channel.id(),
                                        date = %date,
                                        error = %err,
                                        "Unit download failed"
                                    );
                                }
                            }
                            if first_error.is_none() {
                                first_error = Some(err);
                            }
                        }
                    }
                }

                progress.done += 1;
                let _ = tx.send(progress.clone());
            }
        }

        // Fold the new records into the day cache and notify once.
        // Partial success is still success for the data we did get.
        if !touched.is_empty() {
            self.reload_dates_from_store(touched.iter().copied()).await;
        }
        if fetched > 0 {
            self.events().broadcast(GuideEvent::DataChanged);
        }

        if bracket {
            progress.state = DownloadState::Disconnecting;
            let _ = tx.send(progress.clone());
            self.inner_registry().disconnect_all().await;
        }

        progress.state = DownloadState::Idle;
        let _ = tx.send(progress);
        self.batch_flag().store(false, Ordering::SeqCst);

        info!(fetched, skipped, total, cancelled, "Batch download finished");
        BatchResult {
            succeeded: first_error.is_none(),
            first_error,
            fetched,
            skipped,
            total,
            cancelled,
        }
    }
}
