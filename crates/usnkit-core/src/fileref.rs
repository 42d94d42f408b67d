//! File reference identifiers.
//!
//! NTFS identifies table entries with 64-bit file reference numbers (48-bit
//! record number plus 16-bit sequence number); ReFS and version 3 journal
//! records use 128-bit identifiers. [`FileRef`] holds either form.
//!
//! Internally the identifier is kept as a big-endian byte sequence so that
//! byte-wise ordering matches numeric ordering. The file systems themselves
//! store identifiers little-endian, so bytes taken from disk must go through
//! [`FileRef::from_le_bytes`], never [`FileRef::from_be_bytes`].

use serde::{Serialize, Serializer};
use std::fmt;

/// A 64- or 128-bit file table identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FileRef([u8; 16]);

impl FileRef {
    /// The all-zero identifier, meaning "no parent".
    pub const ZERO: FileRef = FileRef([0; 16]);

    /// The NTFS root directory's record number
    pub const ROOT_RECORD_NUMBER: u64 = 5;

    /// Create an identifier from a 64-bit file reference number.
    pub fn from_u64(value: u64) -> Self {
        Self::from_parts(0, value)
    }

    /// Create an identifier from upper and lower 64-bit halves.
    pub fn from_parts(upper: u64, lower: u64) -> Self {
        FileRef(((u128::from(upper) << 64) | u128::from(lower)).to_be_bytes())
    }

    /// Create an identifier from bytes in big-endian order.
    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        FileRef(bytes)
    }

    /// Create an identifier from bytes in little-endian (on-disk) order.
    pub fn from_le_bytes(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        FileRef(bytes)
    }

    /// The identifier as big-endian bytes.
    pub fn to_be_bytes(&self) -> [u8; 16] {
        self.0
    }

    /// The identifier as little-endian (on-disk) bytes.
    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Split into upper and lower 64-bit halves.
    pub fn split(&self) -> (u64, u64) {
        let value = self.as_u128();
        ((value >> 64) as u64, value as u64)
    }

    /// The full 128-bit value.
    pub fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.0)
    }

    /// The identifier as a 64-bit value, if the upper half is zero.
    pub fn as_u64(&self) -> Option<u64> {
        match self.split() {
            (0, lower) => Some(lower),
            _ => None,
        }
    }

    /// Returns true if the identifier fits in 64 bits.
    pub fn is_u64(&self) -> bool {
        self.as_u64().is_some()
    }

    /// Returns true for the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }

    /// The MFT record number (low 48 bits) of a 64-bit reference.
    pub fn record_number(&self) -> Option<u64> {
        self.as_u64().map(|v| v & 0x0000_FFFF_FFFF_FFFF)
    }

    /// The sequence number (high 16 bits) of a 64-bit reference.
    pub fn sequence_number(&self) -> Option<u16> {
        self.as_u64().map(|v| (v >> 48) as u16)
    }
}

impl From<u64> for FileRef {
    fn from(value: u64) -> Self {
        FileRef::from_u64(value)
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_u64() {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "{}", self.as_u128()),
        }
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileRef({})", self)
    }
}

impl Serialize for FileRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
