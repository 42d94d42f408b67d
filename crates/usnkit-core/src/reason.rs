//! Change journal reason codes.
//!
//! Every journal record carries a bitmask of the reasons it was written.
//! The mask is also passed to the device when reading, so that the device
//! only returns records with at least one matching bit.

use crate::error::UsnError;
use serde::Serialize;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// A set of USN reason flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Reason(pub u32);

impl Reason {
    pub const DATA_OVERWRITE: Reason = Reason(0x0000_0001);
    pub const DATA_EXTEND: Reason = Reason(0x0000_0002);
    pub const DATA_TRUNCATION: Reason = Reason(0x0000_0004);
    pub const NAMED_DATA_OVERWRITE: Reason = Reason(0x0000_0010);
    pub const NAMED_DATA_EXTEND: Reason = Reason(0x0000_0020);
    pub const NAMED_DATA_TRUNCATION: Reason = Reason(0x0000_0040);
    pub const FILE_CREATE: Reason = Reason(0x0000_0100);
    pub const FILE_DELETE: Reason = Reason(0x0000_0200);
    pub const EA_CHANGE: Reason = Reason(0x0000_0400);
    pub const SECURITY_CHANGE: Reason = Reason(0x0000_0800);
    pub const RENAME_OLD_NAME: Reason = Reason(0x0000_1000);
    pub const RENAME_NEW_NAME: Reason = Reason(0x0000_2000);
    pub const RENAME: Reason = Reason(0x0000_3000);
    pub const INDEXABLE_CHANGE: Reason = Reason(0x0000_4000);
    pub const BASIC_INFO_CHANGE: Reason = Reason(0x0000_8000);
    pub const HARD_LINK_CHANGE: Reason = Reason(0x0001_0000);
    pub const COMPRESSION_CHANGE: Reason = Reason(0x0002_0000);
    pub const ENCRYPTION_CHANGE: Reason = Reason(0x0004_0000);
    pub const OBJECT_ID_CHANGE: Reason = Reason(0x0008_0000);
    pub const REPARSE_POINT_CHANGE: Reason = Reason(0x0010_0000);
    pub const STREAM_CHANGE: Reason = Reason(0x0020_0000);
    pub const TRANSACTED_CHANGE: Reason = Reason(0x0040_0000);
    pub const INTEGRITY_CHANGE: Reason = Reason(0x0080_0000);
    pub const CLOSE: Reason = Reason(0x8000_0000);

    /// Every bit set, including ones without a name.
    pub const ANY: Reason = Reason(0xFFFF_FFFF);

    /// The empty set.
    pub const NONE: Reason = Reason(0);

    /// The raw bitmask
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Reports whether `self` contains every bit of `other`.
    pub fn contains(self, other: Reason) -> bool {
        self.0 & other.0 == other.0
    }

    /// Reports whether `self` shares at least one bit with `other`.
    pub fn intersects(self, other: Reason) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if both rename bits are set.
    pub fn is_rename(self) -> bool {
        self.contains(Reason::RENAME)
    }

    /// Join the names of the set bits using the given format.
    ///
    /// If the format names the whole value exactly, that name is used. When
    /// both rename bits are present and the format has a combined rename
    /// name, the combined name replaces the two individual ones.
    pub fn join(self, sep: &str, format: ReasonFormat) -> String {
        let table = format.table();
        if let Some(name) = lookup(table, self) {
            return name.to_string();
        }

        let combined_rename = if self.is_rename() {
            lookup(table, Reason::RENAME)
        } else {
            None
        };

        let mut names = Vec::new();
        for bit in 0..32 {
            let code = Reason(1 << bit);
            if !self.contains(code) {
                continue;
            }
            if let Some(rename) = combined_rename {
                if code == Reason::RENAME_OLD_NAME {
                    continue;
                }
                if code == Reason::RENAME_NEW_NAME {
                    names.push(rename);
                    continue;
                }
            }
            if let Some(name) = lookup(table, code) {
                names.push(name);
            }
        }
        names.join(sep)
    }
}

fn lookup(table: &[(Reason, &'static str)], code: Reason) -> Option<&'static str> {
    table
        .iter()
        .find(|(reason, _)| *reason == code)
        .map(|(_, name)| *name)
}

impl BitOr for Reason {
    type Output = Reason;
    fn bitor(self, rhs: Reason) -> Reason {
        Reason(self.0 | rhs.0)
    }
}

impl BitOrAssign for Reason {
    fn bitor_assign(&mut self, rhs: Reason) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Reason {
    type Output = Reason;
    fn bitand(self, rhs: Reason) -> Reason {
        Reason(self.0 & rhs.0)
    }
}

impl Not for Reason {
    type Output = Reason;
    fn not(self) -> Reason {
        Reason(!self.0)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("|", ReasonFormat::Constant))
    }
}

/// Naming styles for reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonFormat {
    /// Official C constants, e.g. `USN_REASON_FILE_CREATE`
    Constant,
    /// Descriptive names, e.g. `FileCreate`
    Basic,
    /// Short names, e.g. `Create`
    Short,
}

impl ReasonFormat {
    fn table(self) -> &'static [(Reason, &'static str)] {
        match self {
            ReasonFormat::Constant => CONSTANT_NAMES,
            ReasonFormat::Basic => BASIC_NAMES,
            ReasonFormat::Short => SHORT_NAMES,
        }
    }
}

static CONSTANT_NAMES: &[(Reason, &str)] = &[
    (Reason::DATA_OVERWRITE, "USN_REASON_DATA_OVERWRITE"),
    (Reason::DATA_EXTEND, "USN_REASON_DATA_EXTEND"),
    (Reason::DATA_TRUNCATION, "USN_REASON_DATA_TRUNCATION"),
    (Reason::NAMED_DATA_OVERWRITE, "USN_REASON_NAMED_DATA_OVERWRITE"),
    (Reason::NAMED_DATA_EXTEND, "USN_REASON_NAMED_DATA_EXTEND"),
    (Reason::NAMED_DATA_TRUNCATION, "USN_REASON_NAMED_DATA_TRUNCATION"),
    (Reason::FILE_CREATE, "USN_REASON_FILE_CREATE"),
    (Reason::FILE_DELETE, "USN_REASON_FILE_DELETE"),
    (Reason::EA_CHANGE, "USN_REASON_EA_CHANGE"),
    (Reason::SECURITY_CHANGE, "USN_REASON_SECURITY_CHANGE"),
    (Reason::RENAME_OLD_NAME, "USN_REASON_RENAME_OLD_NAME"),
    (Reason::RENAME_NEW_NAME, "USN_REASON_RENAME_NEW_NAME"),
    (Reason::INDEXABLE_CHANGE, "USN_REASON_INDEXABLE_CHANGE"),
    (Reason::BASIC_INFO_CHANGE, "USN_REASON_BASIC_INFO_CHANGE"),
    (Reason::HARD_LINK_CHANGE, "USN_REASON_HARD_LINK_CHANGE"),
    (Reason::COMPRESSION_CHANGE, "USN_REASON_COMPRESSION_CHANGE"),
    (Reason::ENCRYPTION_CHANGE, "USN_REASON_ENCRYPTION_CHANGE"),
    (Reason::OBJECT_ID_CHANGE, "USN_REASON_OBJECT_ID_CHANGE"),
    (Reason::REPARSE_POINT_CHANGE, "USN_REASON_REPARSE_POINT_CHANGE"),
    (Reason::STREAM_CHANGE, "USN_REASON_STREAM_CHANGE"),
    (Reason::TRANSACTED_CHANGE, "USN_REASON_TRANSACTED_CHANGE"),
    (Reason::INTEGRITY_CHANGE, "USN_REASON_INTEGRITY_CHANGE"),
    (Reason::CLOSE, "USN_REASON_CLOSE"),
];

static BASIC_NAMES: &[(Reason, &str)] = &[
    (Reason::DATA_OVERWRITE, "DataOverwrite"),
    (Reason::DATA_EXTEND, "DataExtend"),
    (Reason::DATA_TRUNCATION, "DataTruncation"),
    (Reason::NAMED_DATA_OVERWRITE, "NamedDataOverwrite"),
    (Reason::NAMED_DATA_EXTEND, "NamedDataExtend"),
    (Reason::NAMED_DATA_TRUNCATION, "NamedDataTruncation"),
    (Reason::FILE_CREATE, "FileCreate"),
    (Reason::FILE_DELETE, "FileDelete"),
    (Reason::EA_CHANGE, "EAChange"),
    (Reason::SECURITY_CHANGE, "SecurityChange"),
    (Reason::RENAME_OLD_NAME, "RenameOldName"),
    (Reason::RENAME_NEW_NAME, "RenameNewName"),
    (Reason::RENAME, "Rename"),
    (Reason::INDEXABLE_CHANGE, "IndexableChange"),
    (Reason::BASIC_INFO_CHANGE, "BasicInfoChange"),
    (Reason::HARD_LINK_CHANGE, "HardLinkChange"),
    (Reason::COMPRESSION_CHANGE, "CompressionChange"),
    (Reason::ENCRYPTION_CHANGE, "EncryptionChange"),
    (Reason::OBJECT_ID_CHANGE, "ObjectIDChange"),
    (Reason::REPARSE_POINT_CHANGE, "ReparsePointChange"),
    (Reason::STREAM_CHANGE, "StreamChange"),
    (Reason::TRANSACTED_CHANGE, "TransactedChange"),
    (Reason::INTEGRITY_CHANGE, "IntegrityChange"),
    (Reason::CLOSE, "Close"),
];

static SHORT_NAMES: &[(Reason, &str)] = &[
    (Reason::DATA_OVERWRITE, "Overwrite"),
    (Reason::DATA_EXTEND, "Extend"),
    (Reason::DATA_TRUNCATION, "Truncation"),
    (Reason::NAMED_DATA_OVERWRITE, "NamedDataOverwrite"),
    (Reason::NAMED_DATA_EXTEND, "NamedDataExtend"),
    (Reason::NAMED_DATA_TRUNCATION, "NamedDataTruncation"),
    (Reason::FILE_CREATE, "Create"),
    (Reason::FILE_DELETE, "Delete"),
    (Reason::EA_CHANGE, "EAChange"),
    (Reason::SECURITY_CHANGE, "SecurityChange"),
    (Reason::RENAME_OLD_NAME, "RenameOldName"),
    (Reason::RENAME_NEW_NAME, "RenameNewName"),
    (Reason::RENAME, "Rename"),
    (Reason::INDEXABLE_CHANGE, "IndexableChange"),
    (Reason::BASIC_INFO_CHANGE, "BasicInfoChange"),
    (Reason::HARD_LINK_CHANGE, "HardLinkChange"),
    (Reason::COMPRESSION_CHANGE, "CompressionChange"),
    (Reason::ENCRYPTION_CHANGE, "EncryptionChange"),
    (Reason::OBJECT_ID_CHANGE, "ObjectIDChange"),
    (Reason::REPARSE_POINT_CHANGE, "ReparsePointChange"),
    (Reason::STREAM_CHANGE, "StreamChange"),
    (Reason::TRANSACTED_CHANGE, "TransactedChange"),
    (Reason::INTEGRITY_CHANGE, "IntegrityChange"),
    (Reason::CLOSE, "Close"),
];

impl FromStr for Reason {
    type Err = UsnError;

    /// Parse one or more reason names separated by `,` or `|`.
    ///
    /// Accepts the short, basic and constant spellings in any case, plus
    /// `move` for both rename bits and `*`, `all` or `any` for every bit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut code = Reason::NONE;
        for token in s.split([',', '|']) {
            let token = token.trim();
            let lower = token.to_ascii_lowercase();
            code |= match lower.as_str() {
                "*" | "all" | "any" => Reason::ANY,
                "move" => Reason::RENAME,
                _ => parse_name(&lower).ok_or_else(|| UsnError::InvalidReason {
                    token: token.to_string(),
                })?,
            };
        }
        Ok(code)
    }
}

fn parse_name(lower: &str) -> Option<Reason> {
    let bare = lower.strip_prefix("reason").unwrap_or(lower);
    [SHORT_NAMES, BASIC_NAMES, CONSTANT_NAMES]
        .iter()
        .flat_map(|table| table.iter())
        .find(|(_, name)| name.eq_ignore_ascii_case(bare))
        .map(|(reason, _)| *reason)
}
