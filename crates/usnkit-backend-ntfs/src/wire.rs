//! Control code input and output layouts.
//!
//! Structures are serialized field by field in little-endian order rather
//! than transmuted, with trailing padding to the C struct size.

use byteorder::{ByteOrder, LittleEndian};
use usnkit_core::{DeviceError, EnumOptions, JournalData, ReadOptions};

/// `READ_USN_JOURNAL_DATA_V1`
pub const READ_JOURNAL_INPUT_SIZE: usize = 48;
/// `MFT_ENUM_DATA_V1`
pub const ENUM_INPUT_SIZE: usize = 32;
/// `CREATE_USN_JOURNAL_DATA`
pub const CREATE_INPUT_SIZE: usize = 16;
/// `USN_JOURNAL_DATA_V1`, large enough for V0 replies too
pub const JOURNAL_DATA_SIZE: usize = 64;
/// `USN_JOURNAL_DATA_V0`
const JOURNAL_DATA_V0_SIZE: usize = 56;

pub fn read_journal_input(options: &ReadOptions) -> [u8; READ_JOURNAL_INPUT_SIZE] {
    let mut buf = [0u8; READ_JOURNAL_INPUT_SIZE];
    LittleEndian::write_i64(&mut buf[0..8], options.start_usn);
    LittleEndian::write_u32(&mut buf[8..12], options.reason_mask.bits());
    LittleEndian::write_u32(&mut buf[12..16], u32::from(options.return_only_on_close));
    LittleEndian::write_u64(&mut buf[16..24], options.timeout);
    LittleEndian::write_u64(&mut buf[24..32], options.bytes_to_wait_for);
    LittleEndian::write_u64(&mut buf[32..40], options.journal_id);
    LittleEndian::write_u16(&mut buf[40..42], options.min_major_version);
    LittleEndian::write_u16(&mut buf[42..44], options.max_major_version);
    buf
}

pub fn enum_input(options: &EnumOptions) -> [u8; ENUM_INPUT_SIZE] {
    let mut buf = [0u8; ENUM_INPUT_SIZE];
    LittleEndian::write_u64(&mut buf[0..8], options.start_file_reference_number);
    LittleEndian::write_i64(&mut buf[8..16], options.low_usn);
    LittleEndian::write_i64(&mut buf[16..24], options.high_usn);
    LittleEndian::write_u16(&mut buf[24..26], options.min_major_version);
    LittleEndian::write_u16(&mut buf[26..28], options.max_major_version);
    buf
}

pub fn create_input(maximum_size: u64, allocation_delta: u64) -> [u8; CREATE_INPUT_SIZE] {
    let mut buf = [0u8; CREATE_INPUT_SIZE];
    LittleEndian::write_u64(&mut buf[0..8], maximum_size);
    LittleEndian::write_u64(&mut buf[8..16], allocation_delta);
    buf
}

/// Parse a `USN_JOURNAL_DATA` reply.
///
/// A V0 reply carries no version range; 2..=2 is assumed.
pub fn parse_journal_data(reply: &[u8]) -> Result<JournalData, DeviceError> {
    if reply.len() < JOURNAL_DATA_V0_SIZE {
        return Err(DeviceError::Os {
            code: 0,
            message: format!("journal data reply too short: {} bytes", reply.len()),
        });
    }
    let (min_version, max_version) = if reply.len() >= JOURNAL_DATA_V0_SIZE + 4 {
        (
            LittleEndian::read_u16(&reply[56..58]),
            LittleEndian::read_u16(&reply[58..60]),
        )
    } else {
        (2, 2)
    };
    Ok(JournalData {
        journal_id: LittleEndian::read_u64(&reply[0..8]),
        first_usn: LittleEndian::read_i64(&reply[8..16]),
        next_usn: LittleEndian::read_i64(&reply[16..24]),
        lowest_valid_usn: LittleEndian::read_i64(&reply[24..32]),
        max_usn: LittleEndian::read_i64(&reply[32..40]),
        maximum_size: LittleEndian::read_u64(&reply[40..48]),
        allocation_delta: LittleEndian::read_u64(&reply[48..56]),
        min_supported_major_version: min_version,
        max_supported_major_version: max_version,
    })
}
