//! # EPGStore
//!
//! Durable, content-addressed persistence for channel-day programs.
//!
//! One file per (channel, date) pair, named
//! `{channelId}_{sourceName}.{dayCount}`. The name alone answers the
//! questions the hot paths ask: existence checking is a filesystem
//! stat, age-based pruning and per-date availability are directory
//! scans, and nothing is ever deserialized unless a caller actually
//! wants the listings. Records are JSON blobs written to a temporary
//! file and renamed into place, so a crash mid-write never leaves a
//! corrupt-but-present record.

mod archive;

use epgmodel::{Channel, ChannelDayProgram, Date};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors raised by the file store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record exists but its bytes cannot be parsed. Callers must
    /// treat this as "absent" for re-download decisions, but log it.
    #[error("corrupt channel-day record {path}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    /// Writing a record failed. Distinct from fetch problems: this is
    /// a local environment failure (disk full, permissions) likely to
    /// recur for every subsequent record.
    #[error("failed to persist channel-day record {path}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive entry {0} is not a channel-day record")]
    InvalidArchiveEntry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type specialised for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Key of one on-disk record, derived purely from its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub channel_id: String,
    pub source: String,
    pub date: Date,
}

/// The channel-day file store.
///
/// Designed to be shared behind an `Arc`; every operation takes
/// `&self` and relies on single-record filesystem atomicity (atomic
/// rename on publish). There are no cross-record transactions.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if necessary) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when a record for (channel, date) is present.
    ///
    /// This is the primary cache-hit oracle: a stat, never a parse.
    pub fn exists(&self, channel: &Channel, date: Date) -> bool {
        self.record_path(channel, date).is_file()
    }

    /// Loads a record. `Ok(None)` means the record is absent, which is
    /// an expected outcome, not an error.
    pub fn load(&self, channel: &Channel, date: Date) -> Result<Option<ChannelDayProgram>> {
        let path = self.record_path(channel, date);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(program) => Ok(Some(program)),
            Err(err) => Err(StoreError::CorruptRecord {
                path,
                reason: err.to_string(),
            }),
        }
    }

    /// Serializes and writes a record, overwriting any existing one
    /// for the same key. Publish is write-to-temp then rename.
    pub fn store(&self, channel: &Channel, date: Date, program: &ChannelDayProgram) -> Result<()> {
        let path = self.record_path(channel, date);
        let bytes = serde_json::to_vec(program).map_err(|err| StoreError::PersistFailed {
            path: path.clone(),
            source: err.into(),
        })?;
        self.write_atomic(&path, &bytes)
    }

    /// Every record key currently on disk, derived from file names.
    pub fn list_all(&self) -> Result<Vec<RecordKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if let Some(key) = parse_record_name(&name) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Removes every record strictly older than `today - lifespan_days`.
    ///
    /// A record dated exactly `today - lifespan_days` is kept. A
    /// negative lifespan disables the sweep entirely (manual retention
    /// only). Returns the number of records removed.
    pub fn delete_older_than(&self, lifespan_days: i32) -> Result<usize> {
        if lifespan_days < 0 {
            return Ok(0);
        }
        let threshold = Date::today().add_days(-lifespan_days);
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if let Some(key) = parse_record_name(&name) {
                if key.date < threshold {
                    fs::remove_file(entry.path())?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, threshold = %threshold, "Expired channel-day records removed");
        }
        Ok(removed)
    }

    /// True when at least one record is dated `date`. A directory
    /// scan over file-name suffixes, no deserialization.
    pub fn data_available_for(&self, date: Date) -> bool {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return false;
        };
        for entry in entries.flatten() {
            if let Ok(name) = entry.file_name().into_string() {
                if let Some(key) = parse_record_name(&name) {
                    if key.date == date {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Full path of the record for (channel, date).
    pub fn record_path(&self, channel: &Channel, date: Date) -> PathBuf {
        self.dir.join(record_file_name(channel, date))
    }

    pub(crate) fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        // Appending (rather than swapping the extension) keeps the temp
        // name unique per record key.
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let publish = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path));
        publish.map_err(|err| {
            let _ = fs::remove_file(&tmp);
            StoreError::PersistFailed {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }
}

/// Composes the on-disk name `{channelId}_{sourceName}.{dayCount}`.
///
/// Channel ids and source names pass through [`sanitize`] so the name
/// stays a single path component and stays parseable.
pub fn record_file_name(channel: &Channel, date: Date) -> String {
    format!(
        "{}_{}.{}",
        sanitize(channel.id().as_str()),
        sanitize(channel.source()),
        date.days()
    )
}

/// Maps anything outside `[A-Za-z0-9.-]` to `-`, and `_` too since it
/// is the id/source separator in record names.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Inverse of [`record_file_name`]; `None` for foreign files (temp
/// files, stray editor droppings) so scans can skip them silently.
pub(crate) fn parse_record_name(name: &str) -> Option<RecordKey> {
    let (stem, days) = name.rsplit_once('.')?;
    let days: i32 = days.parse().ok()?;
    let (channel_id, source) = stem.rsplit_once('_')?;
    if channel_id.is_empty() || source.is_empty() {
        return None;
    }
    Some(RecordKey {
        channel_id: channel_id.to_string(),
        source: source.to_string(),
        date: Date::from_days(days),
    })
}
