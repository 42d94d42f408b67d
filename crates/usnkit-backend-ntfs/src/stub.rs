//! Stub implementation for non-Windows platforms.

use crate::error::VolumeError;
use crate::path::normalize_volume_path;
use usnkit_core::{
    DeviceError, EnumOptions, JournalData, JournalDevice, ReadOptions, Release,
};

/// Stub volume device for non-Windows platforms.
///
/// This allows the crate to compile on non-Windows platforms, but a volume
/// can never be opened.
pub struct VolumeDevice {
    path: String,
}

impl VolumeDevice {
    pub fn open(volume: &str) -> Result<Self, VolumeError> {
        normalize_volume_path(volume)?;
        Err(VolumeError::Unsupported)
    }
}

fn unsupported() -> DeviceError {
    DeviceError::Unsupported("NTFS volumes are only available on Windows".to_string())
}

impl Release for VolumeDevice {
    fn release(&self) {}
}

impl JournalDevice for VolumeDevice {
    fn name(&self) -> &str {
        &self.path
    }

    fn query_journal(&self) -> Result<JournalData, DeviceError> {
        Err(unsupported())
    }

    fn read_journal(&self, _options: &ReadOptions, _out: &mut [u8]) -> Result<usize, DeviceError> {
        Err(unsupported())
    }

    fn enum_table(&self, _options: &EnumOptions, _out: &mut [u8]) -> Result<usize, DeviceError> {
        Err(unsupported())
    }

    fn create_journal(&self, _maximum_size: u64, _allocation_delta: u64) -> Result<(), DeviceError> {
        Err(unsupported())
    }
}
