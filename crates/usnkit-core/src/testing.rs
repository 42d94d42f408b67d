//! In-memory journal device for unit tests.

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::attr::FileAttributes;
use crate::device::{EnumOptions, JournalData, JournalDevice, ReadOptions, POSITION_MARKER_SIZE};
use crate::error::DeviceError;
use crate::fileref::FileRef;
use crate::handle::{Release, SharedHandle};
use crate::reason::Reason;
use crate::record::{Record, Usn};

pub const JOURNAL_ID: u64 = 0x01d9_3a5c_0000_0001;

/// A canned reply that takes precedence over the simulated data.
pub enum Scripted {
    Page(Vec<u8>),
    Fail(DeviceError),
}

struct JournalState {
    data: Option<JournalData>,
    records: Vec<Record>,
}

pub struct FakeDevice {
    name: String,
    journal: Mutex<JournalState>,
    table: Mutex<Vec<Record>>,
    read_script: Mutex<VecDeque<Scripted>>,
    enum_script: Mutex<VecDeque<Scripted>>,
    releases: Arc<AtomicUsize>,
    reads: AtomicUsize,
}

impl FakeDevice {
    pub fn new() -> Self {
        FakeDevice {
            name: "fake".to_string(),
            journal: Mutex::new(JournalState {
                data: Some(JournalData {
                    journal_id: JOURNAL_ID,
                    first_usn: 0,
                    next_usn: 0,
                    lowest_valid_usn: 0,
                    max_usn: i64::MAX,
                    maximum_size: 32 * 1024 * 1024,
                    allocation_delta: 8 * 1024 * 1024,
                    min_supported_major_version: 2,
                    max_supported_major_version: 3,
                }),
                records: Vec::new(),
            }),
            table: Mutex::new(Vec::new()),
            read_script: Mutex::new(VecDeque::new()),
            enum_script: Mutex::new(VecDeque::new()),
            releases: Arc::new(AtomicUsize::new(0)),
            reads: AtomicUsize::new(0),
        }
    }

    /// A device with no active journal
    pub fn inactive() -> Self {
        let device = Self::new();
        device.journal.lock().data = None;
        device
    }

    pub fn with_table(self, records: Vec<Record>) -> Self {
        {
            let mut table = self.table.lock();
            table.extend(records);
            table.sort_by_key(|r| r.id);
        }
        self
    }

    pub fn with_journal(self, records: Vec<Record>) -> Self {
        for record in records {
            self.append(record);
        }
        self
    }

    /// Append a record at the journal's next USN and return that USN.
    pub fn append(&self, mut record: Record) -> Usn {
        let mut journal = self.journal.lock();
        let usn = journal.data.map(|d| d.next_usn).unwrap_or(0);
        record.usn = usn;
        record.record_length = record.encoded_len() as u32;
        if let Some(data) = journal.data.as_mut() {
            data.next_usn += record.encoded_len() as i64;
        }
        journal.records.push(record);
        usn
    }

    /// Move the journal's first USN, as if old entries were purged.
    pub fn purge_before(&self, usn: Usn) {
        let mut journal = self.journal.lock();
        if let Some(data) = journal.data.as_mut() {
            data.first_usn = usn;
            data.lowest_valid_usn = usn;
        }
        journal.records.retain(|r| r.usn >= usn);
    }

    pub fn push_read(&self, reply: Scripted) {
        self.read_script.lock().push_back(reply);
    }

    pub fn push_enum(&self, reply: Scripted) {
        self.enum_script.lock().push_back(reply);
    }

    pub fn releases(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.releases)
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn into_handle(self) -> SharedHandle<FakeDevice> {
        SharedHandle::new(self)
    }
}

fn play(reply: Scripted, out: &mut [u8]) -> Result<usize, DeviceError> {
    match reply {
        Scripted::Fail(e) => Err(e),
        Scripted::Page(bytes) if bytes.len() > out.len() => Err(DeviceError::InsufficientBuffer),
        Scripted::Page(bytes) => {
            out[..bytes.len()].copy_from_slice(&bytes);
            Ok(bytes.len())
        }
    }
}

/// Pack records after a position marker, stopping when `out` is full.
/// Returns bytes written and the records written.
fn pack<'a>(
    records: impl Iterator<Item = &'a Record>,
    out: &mut [u8],
) -> Result<(usize, Vec<&'a Record>), DeviceError> {
    if out.len() < POSITION_MARKER_SIZE {
        return Err(DeviceError::InsufficientBuffer);
    }
    let mut at = POSITION_MARKER_SIZE;
    let mut written = Vec::new();
    for record in records {
        let bytes = record.encode();
        if at + bytes.len() > out.len() {
            if written.is_empty() {
                return Err(DeviceError::InsufficientBuffer);
            }
            break;
        }
        out[at..at + bytes.len()].copy_from_slice(&bytes);
        at += bytes.len();
        written.push(record);
    }
    Ok((at, written))
}

impl Release for FakeDevice {
    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl JournalDevice for FakeDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn query_journal(&self) -> Result<JournalData, DeviceError> {
        self.journal.lock().data.ok_or(DeviceError::JournalNotActive)
    }

    fn read_journal(&self, options: &ReadOptions, out: &mut [u8]) -> Result<usize, DeviceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.read_script.lock().pop_front() {
            return play(reply, out);
        }

        let journal = self.journal.lock();
        let data = journal.data.ok_or(DeviceError::JournalNotActive)?;
        if options.journal_id != data.journal_id {
            return Err(DeviceError::Os {
                code: 87,
                message: "The parameter is incorrect.".to_string(),
            });
        }
        // USN 0 means "from the start of the journal"
        if options.start_usn != 0 && options.start_usn < data.first_usn {
            return Err(DeviceError::JournalEntryDeleted);
        }

        // Records outside the mask still advance the returned USN.
        let pending: Vec<&Record> = journal
            .records
            .iter()
            .filter(|r| r.usn >= options.start_usn)
            .collect();
        let matching = pending
            .iter()
            .copied()
            .filter(|r| r.reason.intersects(options.reason_mask));
        let (len, written) = pack(matching, out)?;

        let next = match written.last() {
            Some(last) => last.usn + i64::from(last.record_length),
            None => data.next_usn.max(options.start_usn),
        };
        LittleEndian::write_i64(&mut out[..POSITION_MARKER_SIZE], next);
        Ok(len)
    }

    fn enum_table(&self, options: &EnumOptions, out: &mut [u8]) -> Result<usize, DeviceError> {
        if let Some(reply) = self.enum_script.lock().pop_front() {
            return play(reply, out);
        }

        let table = self.table.lock();
        let start = FileRef::from_u64(options.start_file_reference_number);
        let mut candidates = table
            .iter()
            .filter(|r| r.id >= start)
            .filter(|r| r.usn >= options.low_usn && r.usn <= options.high_usn)
            .peekable();
        if candidates.peek().is_none() {
            return Err(DeviceError::EndOfFile);
        }

        let (len, written) = pack(candidates, out)?;
        let next = written
            .last()
            .map(|r| r.id.split().1.wrapping_add(1))
            .unwrap_or(options.start_file_reference_number);
        LittleEndian::write_u64(&mut out[..POSITION_MARKER_SIZE], next);
        Ok(len)
    }

    fn create_journal(&self, maximum_size: u64, allocation_delta: u64) -> Result<(), DeviceError> {
        let mut journal = self.journal.lock();
        match journal.data.as_mut() {
            Some(data) => {
                data.maximum_size = maximum_size;
                data.allocation_delta = allocation_delta;
            }
            None => {
                journal.data = Some(JournalData {
                    journal_id: JOURNAL_ID + 1,
                    maximum_size,
                    allocation_delta,
                    max_usn: i64::MAX,
                    min_supported_major_version: 2,
                    max_supported_major_version: 3,
                    ..JournalData::default()
                });
            }
        }
        Ok(())
    }
}

pub fn dir(id: u64, parent: u64, name: &str) -> Record {
    let mut record = Record::new(FileRef::from_u64(id), FileRef::from_u64(parent), name);
    record.attributes = FileAttributes::DIRECTORY;
    record
}

pub fn file(id: u64, parent: u64, name: &str) -> Record {
    let mut record = Record::new(FileRef::from_u64(id), FileRef::from_u64(parent), name);
    record.attributes = FileAttributes::ARCHIVE;
    record
}

/// A device page: position marker followed by the encoded records.
pub fn page(marker: i64, records: &[Record]) -> Vec<u8> {
    let mut bytes = marker.to_le_bytes().to_vec();
    for record in records {
        bytes.extend(record.encode());
    }
    bytes
}

/// Like [`page`], then the first `keep` bytes of `partial`, as a device
/// does when its buffer ends inside a record.
pub fn page_with_partial(marker: i64, records: &[Record], partial: &Record, keep: usize) -> Vec<u8> {
    let mut bytes = page(marker, records);
    let encoded = partial.encode();
    bytes.extend_from_slice(&encoded[..keep.min(encoded.len())]);
    bytes
}

pub fn with_reason(mut record: Record, reason: Reason) -> Record {
    record.reason = reason;
    record
}
