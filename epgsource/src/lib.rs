//! # EPGSource
//!
//! Common trait and registry for EPGrid listing sources.
//!
//! A data source owns a set of channels and knows how to fetch one
//! channel's listings for one calendar day over whatever wire format
//! it speaks; parsing that format is the source's private business.
//! This crate provides:
//!
//! - **`DataSource`**: the capability set every pluggable source
//!   implements (`connect`, `disconnect`, `fetch_day`, settings
//!   load/store). `Send + Sync`, ready for async callers.
//! - **`SourceRegistry`**: the set of registered sources keyed by
//!   fully-qualified name, with settings persistence and the
//!   connect/disconnect lifecycle sweeps the download orchestrator
//!   uses to bracket a batch.
//!
//! Dynamic discovery of source packages is a collaborator boundary:
//! whoever discovers and instantiates sources hands them to
//! [`SourceRegistry::register`].

mod registry;

pub use registry::SourceRegistry;

use epgmodel::{Channel, ChannelDayProgram, Date};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Persisted per-source settings: a simple key-value property set.
pub type Settings = BTreeMap<String, String>;

/// Error types for data source operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source {source_name} failed to connect: {reason}")]
    ConnectFailed { source_name: String, reason: String },

    #[error("source {source_name} failed to disconnect: {reason}")]
    DisconnectFailed { source_name: String, reason: String },

    #[error("source {source_name} failed to fetch {channel} for {date}: {reason}")]
    FetchFailed {
        source_name: String,
        channel: String,
        date: Date,
        reason: String,
    },

    #[error("settings for source {source_name} could not be {operation}: {reason}")]
    SettingsError {
        source_name: String,
        operation: &'static str,
        reason: String,
    },

    #[error("no registered source named {0}")]
    UnknownSource(String),

    #[error("a source named {0} is already registered")]
    AlreadyRegistered(String),
}

/// Result type for data source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Main trait for listing sources
///
/// A source is conceptually in one of three states: unregistered,
/// registered, connected. The registry does not track per-source
/// connection state itself; `connect`/`disconnect` must be idempotent
/// from the caller's perspective (connecting twice must not double-open
/// a connection); that contract is the implementation's to uphold.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so the registry can hand
/// them to the background download task and the foreground lookup path
/// alike.
#[async_trait::async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Fully-qualified name of the source, unique across the registry.
    ///
    /// Also names the settings file (`{name}.service`) and appears in
    /// record file names, so it should be stable across sessions.
    fn name(&self) -> &str;

    /// Human-readable name for user-facing surfaces.
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Opens whatever connection the source needs for fetching.
    async fn connect(&self) -> Result<()>;

    /// Closes the connection opened by [`DataSource::connect`].
    async fn disconnect(&self) -> Result<()>;

    /// Fetches one channel's listings for one calendar day.
    ///
    /// An empty [`ChannelDayProgram`] is a valid answer and means the
    /// channel is known to broadcast nothing that day.
    async fn fetch_day(&self, channel: &Channel, date: Date) -> Result<ChannelDayProgram>;

    /// Applies persisted settings. Called once at startup with the
    /// content of the source's `.service` file; never called when the
    /// file is absent (the source keeps its defaults).
    fn apply_settings(&self, settings: &Settings);

    /// Collects the current settings for persistence.
    fn collect_settings(&self) -> Settings {
        Settings::new()
    }
}
