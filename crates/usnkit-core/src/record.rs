//! Change journal record codec.
//!
//! A change journal page is a sequence of variable-length records, each
//! starting with an 8-byte header:
//!
//! ```text
//! offset  size  field
//! 0       4     record length (includes padding to an 8-byte boundary)
//! 4       2     major version
//! 6       2     minor version
//! ```
//!
//! Version 2 records carry 64-bit file references and a 60-byte fixed part;
//! version 3 records carry 128-bit references and a 76-byte fixed part. The
//! UTF-16LE file name sits at the offset given in the fixed part.
//!
//! Every field is read at its explicit offset with little-endian reads, so
//! decoding never depends on host layout and never panics on bad input.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{Cursor, Read};

use crate::attr::{FileAttributes, SourceInfo};
use crate::error::{DecodeError, LengthFault};
use crate::fileref::FileRef;
use crate::reason::Reason;

/// Update sequence number: a byte offset into the journal stream.
pub type Usn = i64;

/// Size of the common record header
pub const HEADER_SIZE: usize = 8;

/// Fixed part of a version 2 record
pub const V2_FIXED_SIZE: usize = 60;

/// Fixed part of a version 3 record
pub const V3_FIXED_SIZE: usize = 76;

/// No record can be smaller than this
pub const MIN_RECORD_SIZE: usize = V2_FIXED_SIZE;

/// Default upper bound on a plausible record length
pub const MAX_RECORD_SIZE: u32 = 12288;

/// Windows FILETIME ticks between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// A decoded change journal record.
///
/// Every field except `path` is fixed once decoded. `path` stays empty
/// until a cursor or cache resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub record_length: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub id: FileRef,
    pub parent: FileRef,
    pub usn: Usn,
    pub timestamp: DateTime<Utc>,
    pub reason: Reason,
    pub source_info: SourceInfo,
    pub security_id: u32,
    pub attributes: FileAttributes,
    pub file_name: String,
    /// Resolved path relative to the volume root, empty if unresolved
    pub path: String,
}

impl Record {
    /// Create a record with zeroed metadata.
    ///
    /// The version is 2 unless either id needs 128 bits.
    pub fn new(id: FileRef, parent: FileRef, file_name: impl Into<String>) -> Self {
        let major_version = if id.is_u64() && parent.is_u64() { 2 } else { 3 };
        let mut record = Record {
            record_length: 0,
            major_version,
            minor_version: 0,
            id,
            parent,
            usn: 0,
            timestamp: filetime_to_datetime(0),
            reason: Reason::NONE,
            source_info: SourceInfo::LOCAL,
            security_id: 0,
            attributes: FileAttributes::default(),
            file_name: file_name.into(),
            path: String::new(),
        };
        record.record_length = record.encoded_len() as u32;
        record
    }

    /// Decode one record, rejecting lengths above [`MAX_RECORD_SIZE`].
    pub fn decode(buf: &[u8]) -> Result<Record, DecodeError> {
        Self::decode_with_limit(buf, MAX_RECORD_SIZE)
    }

    /// Decode one record from the start of `buf`.
    ///
    /// `buf` may extend past the record; only the declared length is used.
    pub fn decode_with_limit(buf: &[u8], max_len: u32) -> Result<Record, DecodeError> {
        if buf.len() < HEADER_SIZE {
            return Err(DecodeError::TruncatedInput {
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }

        let record_length = LittleEndian::read_u32(&buf[0..4]);
        let major_version = LittleEndian::read_u16(&buf[4..6]);
        let minor_version = LittleEndian::read_u16(&buf[6..8]);

        if record_length == 0 {
            return Err(DecodeError::InvalidLength {
                length: record_length,
                fault: LengthFault::Zero,
            });
        }
        if record_length > max_len {
            return Err(DecodeError::InvalidLength {
                length: record_length,
                fault: LengthFault::ExceedsMax { max: max_len },
            });
        }

        let fixed_size = match major_version {
            2 => V2_FIXED_SIZE,
            3 => V3_FIXED_SIZE,
            major => {
                return Err(DecodeError::UnsupportedVersion {
                    major,
                    minor: minor_version,
                })
            }
        };

        if buf.len() < fixed_size {
            return Err(DecodeError::TruncatedInput {
                needed: fixed_size,
                available: buf.len(),
            });
        }
        if (record_length as usize) < fixed_size {
            return Err(DecodeError::InvalidLength {
                length: record_length,
                fault: LengthFault::TooSmall {
                    minimum: fixed_size as u32,
                },
            });
        }

        let fixed = read_fixed(&buf[HEADER_SIZE..fixed_size], major_version).map_err(|_| {
            DecodeError::TruncatedInput {
                needed: fixed_size,
                available: buf.len(),
            }
        })?;

        // The name may not overlap the header or fixed fields
        if (fixed.name_offset as usize) < fixed_size {
            return Err(DecodeError::FileNameOutOfBounds {
                offset: fixed.name_offset,
                length: fixed.name_length,
                record_length,
            });
        }
        let name_start = fixed.name_offset as usize;
        let name_end = name_start + fixed.name_length as usize;
        if name_end > buf.len() {
            return Err(DecodeError::TruncatedInput {
                needed: name_end,
                available: buf.len(),
            });
        }
        if name_end > record_length as usize {
            return Err(DecodeError::FileNameOutOfBounds {
                offset: fixed.name_offset,
                length: fixed.name_length,
                record_length,
            });
        }

        Ok(Record {
            record_length,
            major_version,
            minor_version,
            id: fixed.id,
            parent: fixed.parent,
            usn: fixed.usn,
            timestamp: filetime_to_datetime(fixed.timestamp),
            reason: Reason(fixed.reason),
            source_info: SourceInfo(fixed.source_info),
            security_id: fixed.security_id,
            attributes: FileAttributes(fixed.attributes),
            file_name: decode_utf16le(&buf[name_start..name_end]),
            path: String::new(),
        })
    }

    /// Encode the record in its on-disk layout.
    ///
    /// Version 3 uses 128-bit ids; every other version is written with the
    /// version 2 layout. The name follows the fixed part and the total is
    /// padded to 8 bytes.
    pub fn encode(&self) -> Vec<u8> {
        let fixed_size = self.fixed_size();
        let name = self.name_bytes();
        let mut buf = vec![0u8; self.encoded_len()];

        let total = buf.len() as u32;
        LittleEndian::write_u32(&mut buf[0..4], total);
        LittleEndian::write_u16(&mut buf[4..6], self.major_version);
        LittleEndian::write_u16(&mut buf[6..8], self.minor_version);

        let mut at = HEADER_SIZE;
        if self.major_version == 3 {
            buf[at..at + 16].copy_from_slice(&self.id.to_le_bytes());
            buf[at + 16..at + 32].copy_from_slice(&self.parent.to_le_bytes());
            at += 32;
        } else {
            LittleEndian::write_u64(&mut buf[at..at + 8], self.id.split().1);
            LittleEndian::write_u64(&mut buf[at + 8..at + 16], self.parent.split().1);
            at += 16;
        }

        LittleEndian::write_i64(&mut buf[at..at + 8], self.usn);
        LittleEndian::write_i64(&mut buf[at + 8..at + 16], datetime_to_filetime(&self.timestamp));
        LittleEndian::write_u32(&mut buf[at + 16..at + 20], self.reason.bits());
        LittleEndian::write_u32(&mut buf[at + 20..at + 24], self.source_info.bits());
        LittleEndian::write_u32(&mut buf[at + 24..at + 28], self.security_id);
        LittleEndian::write_u32(&mut buf[at + 28..at + 32], self.attributes.bits());
        LittleEndian::write_u16(&mut buf[at + 32..at + 34], name.len() as u16);
        LittleEndian::write_u16(&mut buf[at + 34..at + 36], fixed_size as u16);

        buf[fixed_size..fixed_size + name.len()].copy_from_slice(&name);
        buf
    }

    /// Length of [`Record::encode`]'s output.
    pub fn encoded_len(&self) -> usize {
        align8(self.fixed_size() + self.name_bytes().len())
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }

    /// The resolved path if present, otherwise the bare file name.
    pub fn path_or_name(&self) -> &str {
        if self.path.is_empty() {
            &self.file_name
        } else {
            &self.path
        }
    }

    fn fixed_size(&self) -> usize {
        if self.major_version == 3 {
            V3_FIXED_SIZE
        } else {
            V2_FIXED_SIZE
        }
    }

    fn name_bytes(&self) -> Vec<u8> {
        // Name lengths are 16-bit byte counts on disk.
        self.file_name
            .encode_utf16()
            .take(usize::from(u16::MAX) / 2)
            .flat_map(u16::to_le_bytes)
            .collect()
    }
}

/// Fixed fields following the header
struct Fixed {
    id: FileRef,
    parent: FileRef,
    usn: i64,
    timestamp: i64,
    reason: u32,
    source_info: u32,
    security_id: u32,
    attributes: u32,
    name_length: u16,
    name_offset: u16,
}

fn read_fixed(data: &[u8], major_version: u16) -> std::io::Result<Fixed> {
    let mut rdr = Cursor::new(data);

    let (id, parent) = if major_version == 3 {
        (read_file_id_128(&mut rdr)?, read_file_id_128(&mut rdr)?)
    } else {
        (
            FileRef::from_u64(rdr.read_u64::<LittleEndian>()?),
            FileRef::from_u64(rdr.read_u64::<LittleEndian>()?),
        )
    };

    Ok(Fixed {
        id,
        parent,
        usn: rdr.read_i64::<LittleEndian>()?,
        timestamp: rdr.read_i64::<LittleEndian>()?,
        reason: rdr.read_u32::<LittleEndian>()?,
        source_info: rdr.read_u32::<LittleEndian>()?,
        security_id: rdr.read_u32::<LittleEndian>()?,
        attributes: rdr.read_u32::<LittleEndian>()?,
        name_length: rdr.read_u16::<LittleEndian>()?,
        name_offset: rdr.read_u16::<LittleEndian>()?,
    })
}

fn read_file_id_128(rdr: &mut Cursor<&[u8]>) -> std::io::Result<FileRef> {
    let mut bytes = [0u8; 16];
    rdr.read_exact(&mut bytes)?;
    Ok(FileRef::from_le_bytes(bytes))
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Convert Windows FILETIME ticks (100ns since 1601-01-01 UTC) to UTC.
pub fn filetime_to_datetime(ticks: i64) -> DateTime<Utc> {
    let secs = ticks.div_euclid(TICKS_PER_SECOND) - FILETIME_UNIX_OFFSET_SECS;
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

/// Convert a UTC time to Windows FILETIME ticks.
pub fn datetime_to_filetime(time: &DateTime<Utc>) -> i64 {
    (time.timestamp() + FILETIME_UNIX_OFFSET_SECS)
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(time.timestamp_subsec_nanos() / 100))
}

/// Iterator over the records packed in one device page.
///
/// The page must start at the first record (the 8-byte position marker
/// already stripped). Iteration ends when fewer than [`MIN_RECORD_SIZE`]
/// bytes remain or the next record's declared length runs past the end of
/// the page; a partial trailing record is never decoded. A corrupt record
/// yields one error and ends the iteration.
pub struct Page<'a> {
    data: &'a [u8],
    offset: usize,
    max_len: u32,
    failed: bool,
}

impl<'a> Page<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limit(data, MAX_RECORD_SIZE)
    }

    pub fn with_limit(data: &'a [u8], max_len: u32) -> Self {
        Page {
            data,
            offset: 0,
            max_len,
            failed: false,
        }
    }

    /// Bytes consumed so far
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for Page<'_> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let rest = self.data.get(self.offset..)?;
        if rest.len() < MIN_RECORD_SIZE {
            return None;
        }

        let length = LittleEndian::read_u32(&rest[0..4]);
        let plausible = length != 0 && length <= self.max_len;
        if plausible && length as usize > rest.len() {
            return None;
        }

        match Record::decode_with_limit(rest, self.max_len) {
            Ok(record) => {
                self.offset += length as usize;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
