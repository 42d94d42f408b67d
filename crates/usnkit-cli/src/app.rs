//! Application state management.

use anyhow::Context;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use usnkit_backend_ntfs::VolumeDevice;
use usnkit_core::{Cache, Config, Filter, Journal, SharedHandle, Usn};

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load()?,
    };
    // Reject a bad reason mask before any volume is opened
    config.reason_mask()?;
    Ok(config)
}

/// One opened volume and its settings.
pub struct App {
    /// Configuration
    pub config: Config,

    /// The volume's journal
    pub journal: Journal<VolumeDevice>,
}

impl App {
    /// Open `volume` for journal access.
    pub fn open(config: Config, volume: &str) -> anyhow::Result<Self> {
        let device = VolumeDevice::open(volume)
            .with_context(|| format!("opening {} (try running as administrator)", volume))?;
        let journal = Journal::new(SharedHandle::new(device)).with_config(&config);
        info!(volume = %journal.name(), "Volume opened");
        Ok(App { config, journal })
    }

    /// Enumerate the file table into a cache, keeping entries that pass
    /// `filter`.
    pub fn build_cache(&self, filter: Option<&Filter>) -> anyhow::Result<Arc<Cache>> {
        let never = AtomicBool::new(false);
        let cache = self
            .journal
            .cache(&never, filter, 0, Usn::MAX)
            .map_err(|interrupted| interrupted.error)
            .context("enumerating the master file table")?;
        info!(entries = cache.len(), "File table cached");
        Ok(Arc::new(cache))
    }

    /// Enumerate only directories, enough to resolve any path.
    pub fn directory_cache(&self) -> anyhow::Result<Arc<Cache>> {
        self.build_cache(Some(&Filter::is_dir()))
    }
}
