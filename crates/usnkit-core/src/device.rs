//! The journal device boundary.
//!
//! Everything that talks to the operating system goes through
//! [`JournalDevice`]. The core never issues system calls itself; the NTFS
//! backend implements the trait with `DeviceIoControl`, and tests use a
//! scripted fake.
//!
//! Replies to `read_journal` and `enum_table` share one layout: an 8-byte
//! little-endian position marker (the next USN, or the next file reference
//! number) followed by packed records.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use tracing::debug;

use crate::error::{DeviceError, Operation, Result, UsnError};
use crate::handle::Release;
use crate::reason::Reason;
use crate::record::Usn;

/// Size of the position marker at the start of every reply
pub const POSITION_MARKER_SIZE: usize = 8;

/// Journal status as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JournalData {
    pub journal_id: u64,
    pub first_usn: Usn,
    pub next_usn: Usn,
    pub lowest_valid_usn: Usn,
    pub max_usn: Usn,
    pub maximum_size: u64,
    pub allocation_delta: u64,
    pub min_supported_major_version: u16,
    pub max_supported_major_version: u16,
}

/// Input for a journal read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub start_usn: Usn,
    pub reason_mask: Reason,
    pub return_only_on_close: bool,
    /// Seconds to wait for `bytes_to_wait_for`; 0 returns immediately
    pub timeout: u64,
    pub bytes_to_wait_for: u64,
    pub journal_id: u64,
    pub min_major_version: u16,
    pub max_major_version: u16,
}

impl ReadOptions {
    /// Non-blocking read of all versions this crate decodes.
    pub fn new(start_usn: Usn, reason_mask: Reason, journal_id: u64) -> Self {
        ReadOptions {
            start_usn,
            reason_mask,
            return_only_on_close: false,
            timeout: 0,
            bytes_to_wait_for: 0,
            journal_id,
            min_major_version: 2,
            max_major_version: 3,
        }
    }
}

/// Input for a file table enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumOptions {
    pub start_file_reference_number: u64,
    pub low_usn: Usn,
    pub high_usn: Usn,
    pub min_major_version: u16,
    pub max_major_version: u16,
}

impl EnumOptions {
    pub fn new(start_file_reference_number: u64, low_usn: Usn, high_usn: Usn) -> Self {
        EnumOptions {
            start_file_reference_number,
            low_usn,
            high_usn,
            min_major_version: 2,
            max_major_version: 3,
        }
    }
}

/// A privileged I/O control capability on one volume.
///
/// `read_journal` and `enum_table` fill `out` and return the number of
/// bytes written. A buffer too small for a single record is reported as
/// [`DeviceError::InsufficientBuffer`].
pub trait JournalDevice: Release + Send + Sync {
    /// Resource name used in error messages (e.g. `\\.\C:`)
    fn name(&self) -> &str;

    fn query_journal(&self) -> std::result::Result<JournalData, DeviceError>;

    fn read_journal(
        &self,
        options: &ReadOptions,
        out: &mut [u8],
    ) -> std::result::Result<usize, DeviceError>;

    fn enum_table(
        &self,
        options: &EnumOptions,
        out: &mut [u8],
    ) -> std::result::Result<usize, DeviceError>;

    fn create_journal(
        &self,
        maximum_size: u64,
        allocation_delta: u64,
    ) -> std::result::Result<(), DeviceError>;
}

/// How output buffers grow when the device reports they are too small.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    pub initial_size: usize,
    pub max_size: usize,
    pub max_attempts: u32,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        BufferPolicy {
            initial_size: 64 * 1024,
            max_size: 4 * 1024 * 1024,
            max_attempts: 3,
        }
    }
}

impl BufferPolicy {
    /// A buffer of the initial size.
    pub fn buffer(&self) -> Vec<u8> {
        vec![0u8; self.initial_size]
    }

    /// Run `call` against `buf`, doubling `buf` on `InsufficientBuffer`.
    ///
    /// Growth stops at `max_size`; after `max_attempts` failed calls, or
    /// once the buffer cannot grow, the device error is returned with
    /// context. An empty buffer is first grown to `initial_size`.
    pub fn call<F>(
        &self,
        operation: Operation,
        resource: &str,
        buf: &mut Vec<u8>,
        mut call: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut [u8]) -> std::result::Result<usize, DeviceError>,
    {
        if buf.is_empty() {
            buf.resize(self.initial_size.max(POSITION_MARKER_SIZE), 0);
        }
        let mut attempt = 1;
        loop {
            match call(buf.as_mut_slice()) {
                Ok(n) => return Ok(n.min(buf.len())),
                Err(DeviceError::InsufficientBuffer)
                    if attempt < self.max_attempts && buf.len() < self.max_size =>
                {
                    let grown = (buf.len() * 2).min(self.max_size);
                    debug!(
                        %operation,
                        from = buf.len(),
                        to = grown,
                        attempt,
                        "Growing output buffer"
                    );
                    buf.resize(grown, 0);
                    attempt += 1;
                }
                Err(e) => return Err(UsnError::device(operation, resource, e)),
            }
        }
    }
}

/// Read the position marker at the start of a device reply.
pub fn position_marker(reply: &[u8]) -> Option<i64> {
    if reply.len() < POSITION_MARKER_SIZE {
        None
    } else {
        Some(LittleEndian::read_i64(&reply[..POSITION_MARKER_SIZE]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_doubles_until_success() {
        let policy = BufferPolicy {
            initial_size: 16,
            max_size: 1024,
            max_attempts: 3,
        };
        let mut buf = policy.buffer();
        let mut seen = Vec::new();
        let n = policy
            .call(Operation::ReadJournal, "test", &mut buf, |out| {
                seen.push(out.len());
                if out.len() < 64 {
                    Err(DeviceError::InsufficientBuffer)
                } else {
                    Ok(8)
                }
            })
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(seen, vec![16, 32, 64]);
        assert_eq!(buf.len(), 64);
    }

    #[test]
    fn test_policy_gives_up_after_attempts() {
        let policy = BufferPolicy {
            initial_size: 16,
            max_size: 1024,
            max_attempts: 2,
        };
        let mut buf = policy.buffer();
        let mut calls = 0;
        let err = policy
            .call(Operation::EnumTable, "vol", &mut buf, |_| {
                calls += 1;
                Err(DeviceError::InsufficientBuffer)
            })
            .unwrap_err();
        assert_eq!(calls, 2);
        assert_eq!(err.device_error(), Some(&DeviceError::InsufficientBuffer));
    }

    #[test]
    fn test_policy_respects_cap() {
        let policy = BufferPolicy {
            initial_size: 16,
            max_size: 24,
            max_attempts: 10,
        };
        let mut buf = policy.buffer();
        let mut seen = Vec::new();
        let result = policy.call(Operation::EnumTable, "vol", &mut buf, |out| {
            seen.push(out.len());
            Err(DeviceError::InsufficientBuffer)
        });
        assert!(result.is_err());
        assert_eq!(seen, vec![16, 24]);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let policy = BufferPolicy::default();
        let mut buf = Vec::new();
        let mut calls = 0;
        let err = policy
            .call(Operation::ReadJournal, "vol", &mut buf, |_| {
                calls += 1;
                Err(DeviceError::AccessDenied)
            })
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(buf.len(), 64 * 1024);
        assert!(matches!(
            err,
            UsnError::Device {
                operation: Operation::ReadJournal,
                source: DeviceError::AccessDenied,
                ..
            }
        ));
    }

    #[test]
    fn test_position_marker() {
        assert_eq!(position_marker(&[1, 0, 0, 0]), None);
        assert_eq!(position_marker(&300i64.to_le_bytes()), Some(300));
    }
}
