//! File table access on top of a shared volume handle.

use crate::device::{BufferPolicy, JournalDevice};
use crate::enumerator::Enumerator;
use crate::error::{Result, UsnError};
use crate::fileref::FileRef;
use crate::handle::SharedHandle;
use crate::record::{Record, Usn, MAX_RECORD_SIZE};

/// Looks up and enumerates file table entries.
pub struct Mft<D: JournalDevice> {
    handle: SharedHandle<D>,
    policy: BufferPolicy,
    max_record_size: u32,
}

impl<D: JournalDevice> Mft<D> {
    pub fn new(handle: SharedHandle<D>) -> Self {
        Mft {
            handle,
            policy: BufferPolicy::default(),
            max_record_size: MAX_RECORD_SIZE,
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

    /// Fetch the entry for `id`.
    ///
    /// Enumerates once from `id` and returns the first entry only if it is
    /// exactly `id`. Ids wider than 64 bits cannot be used as a starting
    /// point and are rejected.
    pub fn file(&self, id: FileRef) -> Result<Record> {
        let start = id.as_u64().ok_or(UsnError::UnsupportedFileRef(id))?;
        let mut enumerator = self.enumerate(0, Usn::MAX).starting_at(start);
        let mut buf = self.policy.buffer();
        let first = enumerator
            .next(&mut buf)?
            .and_then(|records| records.into_iter().next());
        enumerator.close()?;

        match first {
            Some(record) if record.id == id => Ok(record),
            _ => Err(UsnError::NotFound(id)),
        }
    }

    /// An enumerator over a clone of this accessor's handle.
    pub fn enumerate(&self, low_usn: Usn, high_usn: Usn) -> Enumerator<D> {
        Enumerator::open(self.handle.clone(), low_usn, high_usn)
            .with_policy(self.policy)
            .with_max_record_size(self.max_record_size)
    }

    pub fn close(&self) -> Result<()> {
        self.handle.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dir, file, FakeDevice};
    use std::sync::atomic::Ordering;

    fn mft() -> Mft<FakeDevice> {
        let device = FakeDevice::new().with_table(vec![
            dir(5, 5, "."),
            dir(40, 5, "docs"),
            file(41, 40, "a.txt"),
        ]);
        Mft::new(device.into_handle())
    }

    #[test]
    fn test_file_exact_match() {
        let mft = mft();
        let record = mft.file(FileRef::from_u64(41)).unwrap();
        assert_eq!(record.file_name, "a.txt");
        assert_eq!(record.parent, FileRef::from_u64(40));
    }

    #[test]
    fn test_file_gap_is_not_found() {
        let mft = mft();
        // 39 is free; enumeration would return 40
        assert!(mft.file(FileRef::from_u64(39)).unwrap_err().is_not_found());
        // past the end of the table
        assert!(mft.file(FileRef::from_u64(1000)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_wide_id_rejected() {
        let id = FileRef::from_parts(1, 41);
        assert!(matches!(
            mft().file(id),
            Err(UsnError::UnsupportedFileRef(rejected)) if rejected == id
        ));
    }

    #[test]
    fn test_lookups_do_not_leak_handles() {
        let device = FakeDevice::new().with_table(vec![dir(5, 5, ".")]);
        let releases = device.releases();
        let mft = Mft::new(device.into_handle());
        for _ in 0..3 {
            mft.file(FileRef::from_u64(5)).unwrap();
        }
        let mut e = mft.enumerate(0, Usn::MAX);
        assert_eq!(e.next(&mut Vec::new()).unwrap().unwrap().len(), 1);
        drop(e);
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        mft.close().unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
