//! Journal device over a Windows volume handle.

use crate::error::VolumeError;
use crate::path::normalize_volume_path;
use crate::winapi_utils::{close_handle, ioctl, open_volume};
use crate::wire::{self, JOURNAL_DATA_SIZE};
use tracing::{debug, trace};
use usnkit_core::{
    DeviceError, EnumOptions, JournalData, JournalDevice, ReadOptions, Release,
};
use windows::Win32::System::Ioctl::{
    FSCTL_CREATE_USN_JOURNAL, FSCTL_ENUM_USN_DATA, FSCTL_QUERY_USN_JOURNAL,
    FSCTL_READ_USN_JOURNAL,
};

/// An open NTFS volume.
///
/// The handle is stored as its raw value so the device can be shared
/// across threads; it is closed by [`Release::release`].
pub struct VolumeDevice {
    raw: isize,
    path: String,
}

impl VolumeDevice {
    /// Open a volume given as `C:`, `C:\` or `\\.\C:`.
    ///
    /// Requires elevated privileges (Administrator or "Perform Volume
    /// Maintenance Tasks").
    pub fn open(volume: &str) -> Result<Self, VolumeError> {
        let path = normalize_volume_path(volume)?;
        let raw = open_volume(&path).map_err(|source| VolumeError::Open {
            volume: path.clone(),
            source,
        })?;
        debug!(volume = %path, "Opened volume");
        Ok(VolumeDevice { raw, path })
    }
}

impl Release for VolumeDevice {
    fn release(&self) {
        close_handle(self.raw);
        debug!(volume = %self.path, "Closed volume");
    }
}

impl JournalDevice for VolumeDevice {
    fn name(&self) -> &str {
        &self.path
    }

    fn query_journal(&self) -> Result<JournalData, DeviceError> {
        let mut reply = [0u8; JOURNAL_DATA_SIZE];
        let n = ioctl(self.raw, FSCTL_QUERY_USN_JOURNAL, None, &mut reply)?;
        wire::parse_journal_data(&reply[..n])
    }

    fn read_journal(&self, options: &ReadOptions, out: &mut [u8]) -> Result<usize, DeviceError> {
        let input = wire::read_journal_input(options);
        let n = ioctl(self.raw, FSCTL_READ_USN_JOURNAL, Some(&input), out)?;
        trace!(start_usn = options.start_usn, bytes = n, "FSCTL_READ_USN_JOURNAL");
        Ok(n)
    }

    fn enum_table(&self, options: &EnumOptions, out: &mut [u8]) -> Result<usize, DeviceError> {
        let input = wire::enum_input(options);
        let n = ioctl(self.raw, FSCTL_ENUM_USN_DATA, Some(&input), out)?;
        trace!(
            start = options.start_file_reference_number,
            bytes = n,
            "FSCTL_ENUM_USN_DATA"
        );
        Ok(n)
    }

    fn create_journal(&self, maximum_size: u64, allocation_delta: u64) -> Result<(), DeviceError> {
        let input = wire::create_input(maximum_size, allocation_delta);
        ioctl(self.raw, FSCTL_CREATE_USN_JOURNAL, Some(&input), &mut [])?;
        Ok(())
    }
}
