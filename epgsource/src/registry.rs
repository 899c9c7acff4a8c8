//! Registry of the pluggable listing sources.

use crate::{DataSource, Result, Settings, SourceError};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Holds the set of registered sources, keyed by fully-qualified name.
///
/// Every sweep operation (`init_sources`, `finalize_sources`,
/// `connect_all`, `disconnect_all`) guards each source independently:
/// one source failing is logged and never prevents the others from
/// being handled.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: RwLock<BTreeMap<String, Arc<dyn DataSource>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under its fully-qualified name.
    ///
    /// A name collision is logged and the new source is skipped, so a
    /// misbehaving plugin cannot shadow an already-registered one.
    pub fn register(&self, source: Arc<dyn DataSource>) -> Result<()> {
        let name = source.name().to_string();
        let mut sources = self.sources.write().unwrap();
        if sources.contains_key(&name) {
            warn!(source = %name, "Source already registered, skipping");
            return Err(SourceError::AlreadyRegistered(name));
        }
        info!(source = %name, "Registered data source");
        sources.insert(name, source);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.read().unwrap().get(name).cloned()
    }

    /// All registered sources, in stable name order.
    pub fn sources(&self) -> Vec<Arc<dyn DataSource>> {
        self.sources.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sources.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().unwrap().is_empty()
    }

    /// Loads each source's persisted settings from
    /// `{settings_dir}/{name}.service`.
    ///
    /// An absent file means the source starts with defaults; that is
    /// not an error and is not even logged above debug. A corrupt file
    /// is logged and the source keeps its defaults.
    pub fn init_sources(&self, settings_dir: &Path) {
        for source in self.sources() {
            let path = settings_path(settings_dir, source.name());
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(_) => {
                    debug!(source = source.name(), "No settings file, using defaults");
                    continue;
                }
            };
            match serde_json::from_slice::<Settings>(&bytes) {
                Ok(settings) => source.apply_settings(&settings),
                Err(err) => {
                    warn!(
                        source = source.name(),
                        error = %err,
                        "Unreadable settings file, using defaults"
                    );
                }
            }
        }
    }

    /// Persists each source's current settings back to its file.
    ///
    /// A failure to persist one source's settings is logged but does
    /// not prevent the others from saving.
    pub fn finalize_sources(&self, settings_dir: &Path) {
        if let Err(err) = fs::create_dir_all(settings_dir) {
            warn!(error = %err, "Cannot create source settings directory");
            return;
        }
        for source in self.sources() {
            let path = settings_path(settings_dir, source.name());
            let settings = source.collect_settings();
            let result = serde_json::to_vec_pretty(&settings)
                .map_err(|err| err.to_string())
                .and_then(|bytes| fs::write(&path, bytes).map_err(|err| err.to_string()));
            if let Err(err) = result {
                warn!(source = source.name(), error = %err, "Failed to persist settings");
            }
        }
    }

    /// Connects every registered source, one failure never blocking
    /// the rest. Returns the number of sources that connected.
    pub async fn connect_all(&self) -> usize {
        let mut connected = 0;
        for source in self.sources() {
            match source.connect().await {
                Ok(()) => {
                    debug!(source = source.name(), "Source connected");
                    connected += 1;
                }
                Err(err) => {
                    warn!(source = source.name(), error = %err, "Source failed to connect");
                }
            }
        }
        connected
    }

    /// Disconnects every registered source; failures are logged per
    /// source. Returns the number of sources that disconnected.
    pub async fn disconnect_all(&self) -> usize {
        let mut disconnected = 0;
        for source in self.sources() {
            match source.disconnect().await {
                Ok(()) => disconnected += 1,
                Err(err) => {
                    warn!(source = source.name(), error = %err, "Source failed to disconnect");
                }
            }
        }
        disconnected
    }
}

/// Path of the settings file for a source: `{name}.service`.
fn settings_path(dir: &Path, source_name: &str) -> std::path::PathBuf {
    dir.join(format!("{source_name}.service"))
}
