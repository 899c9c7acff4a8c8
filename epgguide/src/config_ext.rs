//! Extension wiring the guide into `epgconfig::Config`.
//!
//! Kept behind the `epgconfig` feature so the guide stays usable with
//! a hand-built [`FileStore`] and registry in tests and embedders that
//! bring their own configuration.

use crate::Guide;
use anyhow::Result;
use epgconfig::Config;
use epgsource::SourceRegistry;
use epgstore::FileStore;
use std::sync::Arc;

/// Factory methods building a configured [`Guide`].
pub trait GuideConfigExt {
    /// Creates a guide whose file store lives in the configured data
    /// directory, loads each registered source's persisted settings,
    /// and applies the configured startup online mode.
    fn create_guide(&self, registry: Arc<SourceRegistry>) -> Result<Guide>;

    /// Persists every source's settings back to the configured
    /// settings directory. Call at shutdown.
    fn finalize_guide(&self, guide: &Guide) -> Result<()>;
}

impl GuideConfigExt for Config {
    fn create_guide(&self, registry: Arc<SourceRegistry>) -> Result<Guide> {
        let data_dir = self.get_data_dir()?;
        let settings_dir = self.get_source_settings_dir()?;
        let store = Arc::new(FileStore::new(&data_dir)?);

        registry.init_sources(&settings_dir);

        let guide = Guide::new(store, registry);
        guide.set_online(self.get_online_at_startup());
        Ok(guide)
    }

    fn finalize_guide(&self, guide: &Guide) -> Result<()> {
        let settings_dir = self.get_source_settings_dir()?;
        guide.registry().finalize_sources(&settings_dir);
        Ok(())
    }
}
