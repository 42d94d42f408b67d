//! Sequential reads of the change journal.
//!
//! A [`Cursor`] holds a USN bookmark. Each read asks the device for the
//! records at or after the bookmark that match the reason mask; the reply's
//! position marker becomes the new bookmark. The bookmark never moves
//! backwards on a read, only through [`Cursor::seek`].
//!
//! ## End of data
//!
//! The journal has nothing new when the device returns the bookmark
//! unchanged. A reply that moves the bookmark but carries no records means
//! everything written since matched none of the reasons; the cursor keeps
//! the new position and also reports end of data.
//!
//! ## Pipeline
//!
//! Decoded records pass through an optional [`RecordPipeline`]: the
//! processor sees every record, the filer fills in `path`, and the filter
//! decides what is returned. Statistics are kept before and after the
//! filter.

use std::io::SeekFrom;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::device::{
    position_marker, BufferPolicy, JournalData, JournalDevice, ReadOptions, POSITION_MARKER_SIZE,
};
use crate::error::{Operation, Result, UsnError};
use crate::filer::{self, Filer};
use crate::filter::{self, Filter, Processor};
use crate::handle::SharedHandle;
use crate::reason::Reason;
use crate::record::{Page, Record, Usn, MAX_RECORD_SIZE};
use crate::stats::Stats;

/// A producer of record batches; `None` once exhausted.
pub trait RecordSource {
    fn next_batch(&mut self, buf: &mut Vec<u8>) -> Result<Option<Vec<Record>>>;
}

/// Per-record processing applied by a cursor.
#[derive(Clone, Default)]
pub struct RecordPipeline {
    /// Runs on every decoded record, before path resolution
    pub processor: Option<Processor>,
    /// Decides which records are returned; `None` returns all
    pub filter: Option<Filter>,
    /// Resolves `path` for records with a parent
    pub filer: Option<Arc<dyn Filer + Send + Sync>>,
}

impl RecordPipeline {
    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_filer(mut self, filer: Arc<dyn Filer + Send + Sync>) -> Self {
        self.filer = Some(filer);
        self
    }
}

/// A USN bookmark into one journal.
pub struct Cursor<D: JournalDevice> {
    handle: SharedHandle<D>,
    usn: Usn,
    reason_mask: Reason,
    journal: JournalData,
    pipeline: RecordPipeline,
    policy: BufferPolicy,
    max_record_size: u32,
    total: Stats,
    filtered: Stats,
}

impl<D: JournalDevice> Cursor<D> {
    /// Open a cursor at USN 0 that returns records matching `reason_mask`.
    ///
    /// Queries the journal once to learn its id. The cursor owns `handle`;
    /// if the query fails the handle is closed.
    pub fn open(handle: SharedHandle<D>, reason_mask: Reason) -> Result<Self> {
        let journal = {
            let device = handle.get();
            device
                .query_journal()
                .map_err(|e| UsnError::device(Operation::QueryJournal, device.name(), e))?
        };
        debug!(
            journal_id = journal.journal_id,
            first_usn = journal.first_usn,
            next_usn = journal.next_usn,
            reason_mask = %reason_mask,
            "Opened journal cursor"
        );

        Ok(Cursor {
            handle,
            usn: 0,
            reason_mask,
            journal,
            pipeline: RecordPipeline::default(),
            policy: BufferPolicy::default(),
            max_record_size: MAX_RECORD_SIZE,
            total: Stats::default(),
            filtered: Stats::default(),
        })
    }

    pub fn with_pipeline(mut self, pipeline: RecordPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_policy(mut self, policy: BufferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_record_size(mut self, max_record_size: u32) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Fill `buf` with the next raw reply.
    ///
    /// Returns the reply length, or `None` when there is nothing new. The
    /// filter is not applied; use [`Cursor::next`] for decoded records.
    pub fn read(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>> {
        let options = ReadOptions::new(self.usn, self.reason_mask, self.journal.journal_id);
        let n = {
            let device = self.handle.get();
            self.policy
                .call(Operation::ReadJournal, device.name(), buf, |out| {
                    device.read_journal(&options, out)
                })?
        };

        let next = match position_marker(&buf[..n]) {
            Some(next) => next,
            None => return Ok(None),
        };
        if next <= self.usn {
            return Ok(None);
        }

        trace!(from = self.usn, to = next, bytes = n, "Read journal page");
        self.usn = next;
        if n == POSITION_MARKER_SIZE {
            return Ok(None);
        }
        Ok(Some(n))
    }

    /// Read, decode and filter the next batch of records.
    ///
    /// A batch may be empty when every record was filtered out; `None`
    /// means there is nothing new in the journal.
    pub fn next(&mut self, buf: &mut Vec<u8>) -> Result<Option<Vec<Record>>> {
        let n = match self.read(buf)? {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut matched = Vec::new();
        for record in Page::with_limit(&buf[POSITION_MARKER_SIZE..n], self.max_record_size) {
            let mut record = record?;
            if self.process(&mut record) {
                matched.push(record);
            }
        }
        Ok(Some(matched))
    }

    fn process(&mut self, record: &mut Record) -> bool {
        if let Some(processor) = &self.pipeline.processor {
            processor.process(record);
        }

        if let Some(filer) = &self.pipeline.filer {
            if !record.parent.is_zero() {
                record.path = match filer::resolve(filer.as_ref(), record) {
                    Ok(path) => path,
                    Err(e) => {
                        trace!(id = %record.id, error = %e, "Path lookup failed");
                        record.file_name.clone()
                    }
                };
            }
        }

        self.total.add(record);
        if filter::matches(self.pipeline.filter.as_ref(), record) {
            self.filtered.add(record);
            true
        } else {
            false
        }
    }

    /// Move the bookmark.
    ///
    /// `End` is not supported. Positions past `i64::MAX` or below zero are
    /// rejected and leave the bookmark unchanged.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<Usn> {
        let usn = match pos {
            SeekFrom::Start(n) => Usn::try_from(n).map_err(|_| UsnError::InvalidSeek)?,
            SeekFrom::Current(delta) => self
                .usn
                .checked_add(delta)
                .filter(|usn| *usn >= 0)
                .ok_or(UsnError::InvalidSeek)?,
            SeekFrom::End(_) => return Err(UsnError::InvalidWhence),
        };
        self.usn = usn;
        Ok(usn)
    }

    /// The current bookmark
    pub fn usn(&self) -> Usn {
        self.usn
    }

    /// Statistics of every decoded record and of those that passed the
    /// filter.
    pub fn stats(&self) -> (Stats, Stats) {
        (self.total, self.filtered)
    }

    /// The journal data queried when the cursor was opened
    pub fn journal_data(&self) -> &JournalData {
        &self.journal
    }

    pub fn reason_mask(&self) -> Reason {
        self.reason_mask
    }

    /// Close the cursor's handle instance.
    pub fn close(&self) -> Result<()> {
        self.handle.close()
    }
}

impl<D: JournalDevice> RecordSource for Cursor<D> {
    fn next_batch(&mut self, buf: &mut Vec<u8>) -> Result<Option<Vec<Record>>> {
        self.next(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::fileref::FileRef;
    use crate::testing::{dir, file, page, page_with_partial, with_reason, FakeDevice, Scripted};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn drain<D: JournalDevice>(cursor: &mut Cursor<D>) -> Vec<Record> {
        let mut buf = Vec::new();
        let mut out = Vec::new();
        while let Some(batch) = cursor.next(&mut buf).unwrap() {
            out.extend(batch);
        }
        out
    }

    fn created(id: u64, parent: u64, name: &str) -> Record {
        with_reason(file(id, parent, name), Reason::FILE_CREATE | Reason::CLOSE)
    }

    #[test]
    fn test_reads_journal_in_order_across_pages() {
        let records: Vec<Record> = (0..20u64)
            .map(|i| created(100 + i, 5, &format!("n{:02}", i)))
            .collect();
        let device = FakeDevice::new().with_journal(records);
        let end = device.query_journal().unwrap().next_usn;
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY)
            .unwrap()
            .with_policy(BufferPolicy {
                initial_size: 200,
                max_size: 200,
                max_attempts: 1,
            });

        let out = drain(&mut cursor);
        let names: Vec<_> = out.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names.len(), 20);
        assert_eq!(names[0], "n00");
        assert_eq!(names[19], "n19");
        assert!(out.windows(2).all(|w| w[0].usn < w[1].usn));
        assert_eq!(cursor.usn(), end);

        let (total, filtered) = cursor.stats();
        assert_eq!(total.records, 20);
        assert_eq!(filtered, total);
    }

    #[test]
    fn test_partial_trailing_record_is_read_again() {
        let device = FakeDevice::new();
        let mut whole = Vec::new();
        for (id, name) in [(10, "a.txt"), (11, "b.txt")] {
            let mut record = created(id, 5, name);
            record.usn = device.append(record.clone());
            whole.push(record);
        }
        let mut cut = created(12, 5, "c.txt");
        cut.usn = device.append(cut.clone());
        let end = device.query_journal().unwrap().next_usn;

        // The reply ends 64 bytes into the third record
        device.push_read(Scripted::Page(page_with_partial(cut.usn, &whole, &cut, 64)));
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY).unwrap();
        let mut buf = Vec::new();

        let batch = cursor.next(&mut buf).unwrap().unwrap();
        let names: Vec<_> = batch.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(cursor.usn(), cut.usn);

        let batch = cursor.next(&mut buf).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].file_name, "c.txt");
        assert_eq!(batch[0].usn, cut.usn);
        assert_eq!(cursor.usn(), end);
        assert!(cursor.next(&mut buf).unwrap().is_none());
        assert_eq!(cursor.stats().0.records, 3);
    }

    #[test]
    fn test_unchanged_marker_is_end_of_data() {
        let device = FakeDevice::new();
        device.push_read(Scripted::Page(page(0, &[created(7, 5, "x")])));
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY).unwrap();
        assert!(cursor.next(&mut Vec::new()).unwrap().is_none());
        assert_eq!(cursor.usn(), 0);
        assert_eq!(cursor.stats().0.records, 0);
    }

    #[test]
    fn test_marker_only_reply_advances_and_ends() {
        let device = FakeDevice::new();
        device.push_read(Scripted::Page(page(4096, &[])));
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY).unwrap();
        assert!(cursor.next(&mut Vec::new()).unwrap().is_none());
        assert_eq!(cursor.usn(), 4096);
    }

    #[test]
    fn test_reason_mask_is_applied_by_device() {
        let device = FakeDevice::new().with_journal(vec![
            created(10, 5, "new.txt"),
            with_reason(file(11, 5, "old.txt"), Reason::FILE_DELETE | Reason::CLOSE),
        ]);
        let end = device.query_journal().unwrap().next_usn;
        let mut cursor = Cursor::open(device.into_handle(), Reason::FILE_CREATE).unwrap();

        let mut buf = Vec::new();
        let batch = cursor.next(&mut buf).unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].file_name, "new.txt");
        // The delete is skipped but the bookmark still moves past it
        assert!(cursor.next(&mut buf).unwrap().is_none());
        assert_eq!(cursor.usn(), end);
        assert!(cursor.next(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_seek() {
        let mut cursor = Cursor::open(FakeDevice::new().into_handle(), Reason::ANY).unwrap();
        assert_eq!(cursor.seek(SeekFrom::Start(500)).unwrap(), 500);
        assert_eq!(cursor.seek(SeekFrom::Current(-100)).unwrap(), 400);
        assert_eq!(cursor.seek(SeekFrom::Current(25)).unwrap(), 425);
        assert!(matches!(
            cursor.seek(SeekFrom::Current(-426)),
            Err(UsnError::InvalidSeek)
        ));
        assert!(matches!(
            cursor.seek(SeekFrom::Start(u64::MAX)),
            Err(UsnError::InvalidSeek)
        ));
        assert!(matches!(
            cursor.seek(SeekFrom::End(0)),
            Err(UsnError::InvalidWhence)
        ));
        cursor.seek(SeekFrom::Start(i64::MAX as u64)).unwrap();
        assert!(matches!(
            cursor.seek(SeekFrom::Current(1)),
            Err(UsnError::InvalidSeek)
        ));
        assert_eq!(cursor.usn(), i64::MAX);
    }

    #[test]
    fn test_pipeline_order_and_stats() {
        let device = FakeDevice::new().with_journal(vec![
            created(40, 5, "docs"),
            created(41, 40, "a.txt"),
            created(42, 40, "b.log"),
            created(43, 0, "orphan.txt"),
        ]);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let names: HashMap<FileRef, Record> = [dir(5, 5, "."), dir(40, 5, "docs")]
            .into_iter()
            .map(|r| (r.id, r))
            .collect();
        let filer = move |id: FileRef| names.get(&id).cloned().ok_or(UsnError::NotFound(id));

        let pipeline = RecordPipeline::default()
            .with_processor(Processor::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .with_filter(Filter::path_contains(".txt"))
            .with_filer(Arc::new(filer));

        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY)
            .unwrap()
            .with_pipeline(pipeline);
        let out = drain(&mut cursor);

        let paths: Vec<_> = out.iter().map(|r| r.path.as_str()).collect();
        // The orphan has no parent, so its path stays unresolved
        assert_eq!(paths, vec!["docs\\a.txt", ""]);
        assert_eq!(out[1].path_or_name(), "orphan.txt");
        assert_eq!(seen.load(Ordering::SeqCst), 4);

        let (total, filtered) = cursor.stats();
        assert_eq!(total.records, 4);
        assert_eq!(filtered.records, 2);
        assert!(filtered.bytes < total.bytes);
    }

    #[test]
    fn test_failed_lookup_falls_back_to_name() {
        let device = FakeDevice::new().with_journal(vec![created(41, 40, "a.txt")]);
        let failing = |_id: FileRef| -> Result<Record> { Err(UsnError::Cancelled) };
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY)
            .unwrap()
            .with_pipeline(RecordPipeline::default().with_filer(Arc::new(failing)));
        assert_eq!(drain(&mut cursor)[0].path, "a.txt");
    }

    #[test]
    fn test_inactive_journal() {
        let device = FakeDevice::inactive();
        let releases = device.releases();
        let err = Cursor::open(device.into_handle(), Reason::ANY).err().unwrap();
        assert!(err.is_journal_not_active());
        // The handle was dropped with the failed open
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_purged_position_requires_rescan() {
        let device = FakeDevice::new().with_journal(vec![created(10, 5, "a"), created(11, 5, "b")]);
        device.purge_before(64);
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY).unwrap();
        cursor.seek(SeekFrom::Start(8)).unwrap();
        let err = cursor.next(&mut Vec::new()).unwrap_err();
        assert!(err.requires_rescan());
        assert_eq!(err.device_error(), Some(&DeviceError::JournalEntryDeleted));
    }

    #[test]
    fn test_decode_error_propagates() {
        let device = FakeDevice::new();
        let mut bytes = page(128, &[created(7, 5, "x")]);
        bytes[POSITION_MARKER_SIZE] = 0;
        bytes[POSITION_MARKER_SIZE + 1] = 0;
        device.push_read(Scripted::Page(bytes));
        let mut cursor = Cursor::open(device.into_handle(), Reason::ANY).unwrap();
        assert!(matches!(
            cursor.next(&mut Vec::new()),
            Err(UsnError::Decode(_))
        ));
    }
}
