//! # EPGGuide
//!
//! The TV-guide façade: an in-memory day cache backed by the
//! channel-day file store, a batch download orchestrator, pattern
//! search over the cached data, and a data-changed event bus.
//!
//! A [`Guide`] is an explicitly constructed service: the application
//! creates the [`epgstore::FileStore`] and the
//! [`epgsource::SourceRegistry`], hands both to [`Guide::new`], and
//! owns the lifecycle (settings load at startup, settings persist at
//! shutdown). Cloning a `Guide` clones a handle, not the state.
//!
//! ## Concurrency model
//!
//! At most one batch download runs at a time, on its own tokio task.
//! The opportunistic single-unit fetch that [`Guide::get_day_program`]
//! performs on a cache miss declines to run while a batch is active,
//! so the file store never sees two writers for the same (channel,
//! date) key and the in-memory day map is only ever fed by one path at
//! a time.

mod downloader;
mod events;
mod search;

#[cfg(feature = "epgconfig")]
mod config_ext;

pub use downloader::{BatchHandle, BatchProgress, BatchResult, DownloadState};
pub use events::{GuideEvent, GuideEventBus};
pub use search::{SearchError, SearchRequest, MAX_CONSECUTIVE_MISSES};

#[cfg(feature = "epgconfig")]
pub use config_ext::GuideConfigExt;

use epgmodel::{Channel, ChannelDayProgram, DayProgram, Date};
use epgsource::{SourceError, SourceRegistry};
use epgstore::{FileStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::sync::RwLock as StdRwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Errors raised by guide operations
#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    /// A second batch was requested while one is in flight. Batches
    /// are never interleaved; retry after the running one finishes.
    #[error("a batch download is already running")]
    BatchAlreadyRunning,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type specialised for guide operations
pub type Result<T> = std::result::Result<T, GuideError>;

#[derive(Debug)]
struct GuideInner {
    store: Arc<FileStore>,
    registry: Arc<SourceRegistry>,
    /// date -> assembled multi-channel day program
    days: RwLock<HashMap<Date, DayProgram>>,
    /// Subscribed channels, in presentation order.
    subscriptions: StdRwLock<Vec<Channel>>,
    /// Application-wide "online mode": sources are connected and
    /// available for opportunistic single-unit fetches.
    online: AtomicBool,
    /// True while a batch task owns the download loop.
    batch_active: AtomicBool,
    /// Cooperative cancellation flag of the current batch.
    cancel: AtomicBool,
    events: GuideEventBus,
}

/// The TV listings cache and download orchestrator.
#[derive(Debug, Clone)]
pub struct Guide {
    inner: Arc<GuideInner>,
}

impl Guide {
    pub fn new(store: Arc<FileStore>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            inner: Arc::new(GuideInner {
                store,
                registry,
                days: RwLock::new(HashMap::new()),
                subscriptions: StdRwLock::new(Vec::new()),
                online: AtomicBool::new(false),
                batch_active: AtomicBool::new(false),
                cancel: AtomicBool::new(false),
                events: GuideEventBus::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.inner.registry
    }

    // ============= Online mode & events =============

    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Subscribes to data-changed notifications.
    pub fn subscribe_events(&self) -> crossbeam_channel::Receiver<GuideEvent> {
        self.inner.events.subscribe()
    }

    // ============= Subscriptions =============

    pub fn subscribed_channels(&self) -> Vec<Channel> {
        self.inner.subscriptions.read().unwrap().clone()
    }

    /// Replaces the subscribed-channel set.
    ///
    /// Every cached date is rebuilt from the file store (not wiped),
    /// so listings already on disk for the new channels appear without
    /// a refetch, and removed channels disappear.
    pub async fn set_subscribed_channels(&self, channels: Vec<Channel>) {
        {
            let mut subscriptions = self.inner.subscriptions.write().unwrap();
            *subscriptions = channels;
        }
        let cached: Vec<Date> = self.inner.days.read().await.keys().copied().collect();
        self.reload_dates_from_store(cached.iter().copied()).await;
        self.inner.events.broadcast(GuideEvent::DataChanged);
    }

    // ============= Read path =============

    /// Returns the day program for `date`, assembling it on a miss.
    ///
    /// Assembly loads each subscribed channel's record from the file
    /// store; channels with no record are fetched on the spot when the
    /// guide is online and no batch is running (the decline rule keeps
    /// the batch task the sole writer while it is active). `None`
    /// means nothing at all is known for the date, which is distinct
    /// from a day where channels are known to broadcast nothing.
    pub async fn get_day_program(&self, date: Date) -> Option<DayProgram> {
        if let Some(day) = self.inner.days.read().await.get(&date) {
            debug!(date = %date, "Day cache hit");
            return Some(day.clone());
        }

        let channels = self.subscribed_channels();
        if channels.is_empty() {
            return None;
        }

        let mut day = DayProgram::new(date);
        for channel in &channels {
            match self.load_channel_day(channel, date) {
                Some(program) => {
                    let _ = day.add(program);
                }
                None if self.may_fetch_opportunistically() => {
                    match self.fetch_one(channel, date).await {
                        Ok(program) => {
                            let _ = day.add(program);
                        }
                        Err(err) => {
                            warn!(
                                channel = %channel.id(),
                                date = %date,
                                error = %err,
                                "Opportunistic fetch failed"
                            );
                        }
                    }
                }
                None => {}
            }
        }

        if day.is_empty() {
            return None;
        }
        self.inner.days.write().await.insert(date, day.clone());
        Some(day)
    }

    /// Fetches one (channel, date) unit from its owning source and
    /// writes it through the file store before returning, so a crash
    /// right after a successful fetch still leaves the data durable.
    pub async fn fetch_one(&self, channel: &Channel, date: Date) -> Result<ChannelDayProgram> {
        let source = self
            .inner
            .registry
            .get(channel.source())
            .ok_or_else(|| SourceError::UnknownSource(channel.source().to_string()))?;
        let program = source.fetch_day(channel, date).await?;
        self.inner.store.store(channel, date, &program)?;
        Ok(program)
    }

    // ============= Maintenance =============

    /// Removes on-disk records strictly older than `today -
    /// lifespan_days` and drops the affected cached dates. Negative
    /// lifespan removes nothing (manual retention only).
    pub async fn delete_expired_data(&self, lifespan_days: i32) -> Result<usize> {
        let removed = self.inner.store.delete_older_than(lifespan_days)?;
        if removed > 0 {
            let threshold = Date::today().add_days(-lifespan_days);
            self.inner.days.write().await.retain(|date, _| *date >= threshold);
            self.inner.events.broadcast(GuideEvent::DataChanged);
        }
        Ok(removed)
    }

    /// Exports the whole file store as one portable archive.
    pub fn export_archive<W: Write>(&self, writer: W) -> Result<()> {
        self.inner.store.export_archive(writer)?;
        Ok(())
    }

    /// Imports an archive into the file store. Existing records are
    /// never overwritten. Fires a data-changed notification when at
    /// least one record was added.
    pub async fn import_archive<R: Read>(&self, reader: R) -> Result<usize> {
        let imported = self.inner.store.import_archive(reader)?;
        if imported > 0 {
            let cached: Vec<Date> = self.inner.days.read().await.keys().copied().collect();
            self.reload_dates_from_store(cached.iter().copied()).await;
            self.inner.events.broadcast(GuideEvent::DataChanged);
        }
        Ok(imported)
    }

    // ============= Internals =============

    fn may_fetch_opportunistically(&self) -> bool {
        self.is_online() && !self.inner.batch_active.load(Ordering::SeqCst)
    }

    /// Loads one record, downgrading corruption to "absent" (with a
    /// warning) so the caller re-downloads it.
    fn load_channel_day(&self, channel: &Channel, date: Date) -> Option<ChannelDayProgram> {
        match self.inner.store.load(channel, date) {
            Ok(found) => found,
            Err(err @ StoreError::CorruptRecord { .. }) => {
                warn!(channel = %channel.id(), date = %date, error = %err, "Corrupt record, treating as missing");
                None
            }
            Err(err) => {
                warn!(channel = %channel.id(), date = %date, error = %err, "Record load failed");
                None
            }
        }
    }

    /// Builds a day program for `date` from the file store only.
    fn build_from_store(&self, date: Date, channels: &[Channel]) -> DayProgram {
        let mut day = DayProgram::new(date);
        for channel in channels {
            if let Some(program) = self.load_channel_day(channel, date) {
                let _ = day.add(program);
            }
        }
        day
    }

    /// Rebuilds the given cached dates from the file store. Dates that
    /// end up empty are dropped; dates not yet cached are inserted
    /// when the store has data for them.
    pub(crate) async fn reload_dates_from_store(&self, dates: impl IntoIterator<Item = Date>) {
        let channels = self.subscribed_channels();
        let dates: HashSet<Date> = dates.into_iter().collect();
        if dates.is_empty() {
            return;
        }
        let mut days = self.inner.days.write().await;
        for date in dates {
            let rebuilt = self.build_from_store(date, &channels);
            if rebuilt.is_empty() {
                days.remove(&date);
            } else {
                days.insert(date, rebuilt);
            }
        }
    }

    pub(crate) fn inner_store(&self) -> &FileStore {
        &self.inner.store
    }

    pub(crate) fn inner_registry(&self) -> &SourceRegistry {
        &self.inner.registry
    }

    pub(crate) fn events(&self) -> &GuideEventBus {
        &self.inner.events
    }

    pub(crate) fn batch_flag(&self) -> &AtomicBool {
        &self.inner.batch_active
    }

    pub(crate) fn cancel_flag(&self) -> &AtomicBool {
        &self.inner.cancel
    }
}
