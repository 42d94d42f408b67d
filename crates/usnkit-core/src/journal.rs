//! Entry point for one volume's change journal.
//!
//! [`Journal`] owns one [`SharedHandle`] instance and hands out components
//! that each own a clone of it: cursors, file table accessors, monitors.
//! Every component must be closed (or dropped) on its own; the volume is
//! released once all of them and the journal itself are closed.

use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::debug;

use crate::cache::{Cache, Interrupted};
use crate::config::Config;
use crate::cursor::{Cursor, RecordPipeline};
use crate::device::{BufferPolicy, JournalData, JournalDevice};
use crate::error::{Operation, Result, UsnError};
use crate::filter::Filter;
use crate::handle::SharedHandle;
use crate::mft::Mft;
use crate::monitor::{Monitor, MIN_POLL_INTERVAL};
use crate::reason::Reason;
use crate::record::{Usn, MAX_RECORD_SIZE};

pub struct Journal<D: JournalDevice + 'static> {
    handle: SharedHandle<D>,
    policy: BufferPolicy,
    max_record_size: u32,
    min_interval: Duration,
}

impl<D: JournalDevice + 'static> Journal<D> {
    pub fn new(handle: SharedHandle<D>) -> Self {
        Journal {
            handle,
            policy: BufferPolicy::default(),
            max_record_size: MAX_RECORD_SIZE,
            min_interval: MIN_POLL_INTERVAL,
        }
    }

    /// Apply buffer, decode and polling limits from `config`.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.policy = config.buffer_policy();
        self.max_record_size = config.decode.max_record_size;
        self.min_interval = config.min_poll_interval();
        self
    }

    /// The device name, e.g. `\\.\C:`
    pub fn name(&self) -> String {
        self.handle.get().name().to_string()
    }

    /// Query the journal's current state.
    pub fn query(&self) -> Result<JournalData> {
        let device = self.handle.get();
        device
            .query_journal()
            .map_err(|e| UsnError::device(Operation::QueryJournal, device.name(), e))
    }

    /// Create the journal, or adjust its sizes if it already exists, and
    /// return its new state.
    pub fn create(&self, maximum_size: u64, allocation_delta: u64) -> Result<JournalData> {
        {
            let device = self.handle.get();
            device
                .create_journal(maximum_size, allocation_delta)
                .map_err(|e| UsnError::device(Operation::CreateJournal, device.name(), e))?;
        }
        debug!(maximum_size, allocation_delta, "Created journal");
        self.query()
    }

    /// A cursor over a clone of the handle, starting at USN 0.
    pub fn cursor(&self, reason_mask: Reason, pipeline: RecordPipeline) -> Result<Cursor<D>> {
        Ok(Cursor::open(self.handle.clone(), reason_mask)?
            .with_pipeline(pipeline)
            .with_policy(self.policy)
            .with_max_record_size(self.max_record_size))
    }

    /// A file table accessor over a clone of the handle.
    pub fn mft(&self) -> Mft<D> {
        Mft::new(self.handle.clone())
            .with_policy(self.policy)
            .with_max_record_size(self.max_record_size)
    }

    /// Enumerate the file table into a new cache.
    ///
    /// Only entries whose last USN lies in `low_usn..=high_usn` and that
    /// pass `filter` are kept.
    pub fn cache(
        &self,
        cancel: &AtomicBool,
        filter: Option<&Filter>,
        low_usn: Usn,
        high_usn: Usn,
    ) -> std::result::Result<Cache, Interrupted> {
        let mft = self.mft();
        let mut enumerator = mft.enumerate(low_usn, high_usn);
        let built = Cache::build_from(&mut enumerator, filter, cancel);
        let _ = enumerator.close();
        let _ = mft.close();
        if let Ok(cache) = &built {
            debug!(entries = cache.len(), "Built file table cache");
        }
        built
    }

    /// An idle monitor over a clone of the handle.
    pub fn monitor(&self) -> Monitor<D> {
        Monitor::new(self.handle.clone())
            .with_min_interval(self.min_interval)
            .with_policy(self.policy)
            .with_max_record_size(self.max_record_size)
    }

    /// Close the journal's own handle instance.
    pub fn close(&self) -> Result<()> {
        self.handle.close()
    }
}
