//! Sequential enumeration of the file table.
//!
//! Each read asks the device for the entries at or after the current file
//! reference number. The reply's position marker becomes the next starting
//! point. The table is exhausted when the device reports end-of-file, the
//! marker stops moving, or the reply carries nothing but the marker.

use tracing::{debug, trace};

use crate::cursor::RecordSource;
use crate::device::{position_marker, BufferPolicy, EnumOptions, JournalDevice, POSITION_MARKER_SIZE};
use crate::error::{DeviceError, Operation, Result};
use crate::handle::SharedHandle;
use crate::record::{Page, Record, Usn, MAX_RECORD_SIZE};

/// Reads every live file table entry once.
pub struct Enumerator<D: JournalDevice> {
    handle: SharedHandle<D>,
    position: u64,
    low_usn: Usn,
    high_usn: Usn,
    policy: BufferPolicy,
    max_record_size: u32,
    done: bool,
}

impl<D: JournalDevice> Enumerator<D> {
    /// Enumerate entries whose last USN lies in `low_usn..=high_usn`.
    ///
    /// The enumerator owns `handle` and closes it on [`Enumerator::close`]
    /// or drop.
    pub fn open(handle: SharedHandle<D>, low_usn: Usn, high_usn: Usn) -> Self {
        Enumerator {
            handle,
            position: 0,
            low_usn,
            high_usn,
            policy: BufferPolicy::default(),
            max_record_size: MAX_RECORD_SIZE,
            done: false,
        }
    }

    pub fn with_policy(mut self, policy: BufferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_record_size(mut self, max_record_size: u32) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Start from `file_reference_number` instead of 0.
    pub fn starting_at(mut self, file_reference_number: u64) -> Self {
        self.position = file_reference_number;
        self
    }

    /// The file reference number the next read starts from
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Fill `buf` with the next raw page.
    ///
    /// Returns the reply length, or `None` at the end of the table. `buf`
    /// may be grown if the device reports it too small.
    pub fn read(&mut self, buf: &mut Vec<u8>) -> Result<Option<usize>> {
        if self.done {
            return Ok(None);
        }

        let options = EnumOptions::new(self.position, self.low_usn, self.high_usn);
        let device = self.handle.get();
        let reply = self
            .policy
            .call(Operation::EnumTable, device.name(), buf, |out| {
                device.enum_table(&options, out)
            });

        let n = match reply {
            Ok(n) => n,
            Err(e) if e.device_error() == Some(&DeviceError::EndOfFile) => {
                debug!(position = self.position, "End of file table");
                self.done = true;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let marker = match position_marker(&buf[..n]) {
            Some(marker) => marker as u64,
            None => {
                self.done = true;
                return Ok(None);
            }
        };
        if marker == self.position || n == POSITION_MARKER_SIZE {
            debug!(position = self.position, "End of file table");
            self.done = true;
            return Ok(None);
        }

        trace!(from = self.position, to = marker, bytes = n, "Read file table page");
        self.position = marker;
        Ok(Some(n))
    }

    /// Read and decode the next page of records.
    ///
    /// A corrupt record aborts the batch with a decode error.
    pub fn next(&mut self, buf: &mut Vec<u8>) -> Result<Option<Vec<Record>>> {
        let n = match self.read(buf)? {
            Some(n) => n,
            None => return Ok(None),
        };
        let records = Page::with_limit(&buf[POSITION_MARKER_SIZE..n], self.max_record_size)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Some(records))
    }

    /// Close the enumerator's handle instance.
    pub fn close(&self) -> Result<()> {
        self.handle.close()
    }
}

impl<D: JournalDevice> RecordSource for Enumerator<D> {
    fn next_batch(&mut self, buf: &mut Vec<u8>) -> Result<Option<Vec<Record>>> {
        self.next(buf)
    }
}
