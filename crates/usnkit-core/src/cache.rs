//! In-memory file table snapshot used for path resolution.
//!
//! A [`Cache`] maps file references to records. It is usually filled once
//! from a file table enumeration and then kept current by a monitor's
//! processor as directories are created or renamed. Entries are inserted or
//! overwritten, never removed.
//!
//! The map is a `DashMap`, so a background thread may insert while other
//! threads resolve paths.

use dashmap::DashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::cursor::RecordSource;
use crate::error::{Result, UsnError};
use crate::filer::{self, Filer};
use crate::fileref::FileRef;
use crate::filter::{self, Filter, Processor};
use crate::record::Record;

/// A partially built cache and the error that stopped it.
#[derive(Debug, Error)]
#[error("cache build interrupted: {error}")]
pub struct Interrupted {
    pub partial: Cache,
    #[source]
    pub error: UsnError,
}

#[derive(Debug, Default)]
pub struct Cache {
    records: DashMap<FileRef, Record>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain `source` into a new cache.
    ///
    /// On failure or cancellation the records read so far are returned
    /// alongside the error.
    pub fn build_from<S>(
        source: &mut S,
        filter: Option<&Filter>,
        cancel: &AtomicBool,
    ) -> std::result::Result<Cache, Interrupted>
    where
        S: RecordSource + ?Sized,
    {
        let cache = Cache::new();
        match cache.read_from(source, filter, cancel) {
            Ok(_) => Ok(cache),
            Err(error) => Err(Interrupted {
                partial: cache,
                error,
            }),
        }
    }

    /// Drain `source`, inserting the records that pass `filter`.
    ///
    /// `cancel` is checked before every read; once set, the records already
    /// inserted stay and [`UsnError::Cancelled`] is returned. Returns the
    /// number of records inserted.
    pub fn read_from<S>(
        &self,
        source: &mut S,
        filter: Option<&Filter>,
        cancel: &AtomicBool,
    ) -> Result<usize>
    where
        S: RecordSource + ?Sized,
    {
        let mut buf = Vec::new();
        let mut inserted = 0;
        loop {
            if cancel.load(Ordering::Acquire) {
                debug!(inserted, "Cache read cancelled");
                return Err(UsnError::Cancelled);
            }
            let batch = match source.next_batch(&mut buf)? {
                Some(batch) => batch,
                None => break,
            };
            for record in batch {
                if filter::matches(filter, &record) {
                    self.insert(record);
                    inserted += 1;
                }
            }
        }
        debug!(inserted, total = self.len(), "Cache populated");
        Ok(inserted)
    }

    /// Insert or overwrite the entry for `record.id`.
    pub fn insert(&self, record: Record) {
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: FileRef) -> Result<Record> {
        self.records
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(UsnError::NotFound(id))
    }

    pub fn contains(&self, id: FileRef) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ancestors of `record` present in the cache, nearest first.
    pub fn parents(&self, record: &Record) -> Vec<Record> {
        filer::parents(self, record).unwrap_or_default()
    }

    /// `record`'s path relative to the volume root, components joined by
    /// `\`. Missing ancestors truncate the path.
    pub fn resolve_path(&self, record: &Record) -> String {
        filer::resolve(self, record).unwrap_or_else(|_| record.file_name.clone())
    }

    /// Every cached record with its path resolved.
    pub fn records(&self) -> Vec<Record> {
        let snapshot: Vec<Record> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        snapshot
            .into_par_iter()
            .map(|mut record| {
                record.path = self.resolve_path(&record);
                record
            })
            .collect()
    }

    /// A processor that copies directory records into `cache`, keeping
    /// paths current while a journal is followed.
    pub fn directory_processor(cache: &Arc<Cache>) -> Processor {
        let cache = Arc::clone(cache);
        Processor::new(move |record| {
            if record.is_dir() {
                cache.insert(record.clone());
            }
        })
    }
}

impl Filer for Cache {
    fn file(&self, id: FileRef) -> Result<Record> {
        self.get(id)
    }
}
