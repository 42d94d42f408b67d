//! File attribute and source-info bitmasks carried by journal records.

use serde::Serialize;
use std::fmt;
use std::ops::BitOr;

/// Windows file attributes (`FILE_ATTRIBUTE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct FileAttributes(pub u32);

impl FileAttributes {
    pub const READONLY: FileAttributes = FileAttributes(0x0000_0001);
    pub const HIDDEN: FileAttributes = FileAttributes(0x0000_0002);
    pub const SYSTEM: FileAttributes = FileAttributes(0x0000_0004);
    pub const DIRECTORY: FileAttributes = FileAttributes(0x0000_0010);
    pub const ARCHIVE: FileAttributes = FileAttributes(0x0000_0020);
    pub const DEVICE: FileAttributes = FileAttributes(0x0000_0040);
    pub const NORMAL: FileAttributes = FileAttributes(0x0000_0080);
    pub const TEMPORARY: FileAttributes = FileAttributes(0x0000_0100);
    pub const SPARSE_FILE: FileAttributes = FileAttributes(0x0000_0200);
    pub const REPARSE_POINT: FileAttributes = FileAttributes(0x0000_0400);
    pub const COMPRESSED: FileAttributes = FileAttributes(0x0000_0800);
    pub const OFFLINE: FileAttributes = FileAttributes(0x0000_1000);
    pub const NOT_CONTENT_INDEXED: FileAttributes = FileAttributes(0x0000_2000);
    pub const ENCRYPTED: FileAttributes = FileAttributes(0x0000_4000);
    pub const INTEGRITY_STREAM: FileAttributes = FileAttributes(0x0000_8000);
    pub const VIRTUAL: FileAttributes = FileAttributes(0x0001_0000);
    pub const NO_SCRUB_DATA: FileAttributes = FileAttributes(0x0002_0000);
    pub const RECALL_ON_OPEN: FileAttributes = FileAttributes(0x0004_0000);
    pub const RECALL_ON_DATA_ACCESS: FileAttributes = FileAttributes(0x0040_0000);

    /// The raw bitmask
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Reports whether every bit of `other` is set.
    pub fn contains(self, other: FileAttributes) -> bool {
        self.0 & other.0 == other.0
    }

    /// Reports whether any bit of `other` is set.
    pub fn intersects(self, other: FileAttributes) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_dir(self) -> bool {
        self.contains(FileAttributes::DIRECTORY)
    }

    /// Join the names of the set bits using the given format.
    pub fn join(self, sep: &str, format: AttributeFormat) -> String {
        let table = format.table();
        if let Some((_, name)) = table.iter().find(|(attr, _)| *attr == self) {
            return name.to_string();
        }
        (0..32)
            .map(|bit| FileAttributes(1 << bit))
            .filter(|flag| self.contains(*flag))
            .filter_map(|flag| {
                table
                    .iter()
                    .find(|(attr, _)| *attr == flag)
                    .map(|(_, name)| *name)
            })
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl BitOr for FileAttributes {
    type Output = FileAttributes;
    fn bitor(self, rhs: FileAttributes) -> FileAttributes {
        FileAttributes(self.0 | rhs.0)
    }
}

impl fmt::Display for FileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("|", AttributeFormat::Name))
    }
}

/// Naming styles for file attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    /// C constants, e.g. `FILE_ATTRIBUTE_HIDDEN`
    Constant,
    /// Names, e.g. `Hidden`
    Name,
    /// Single-letter codes as shown by Explorer, e.g. `H`
    Code,
}

impl AttributeFormat {
    fn table(self) -> &'static [(FileAttributes, &'static str)] {
        match self {
            AttributeFormat::Constant => ATTRIBUTE_CONSTANTS,
            AttributeFormat::Name => ATTRIBUTE_NAMES,
            AttributeFormat::Code => ATTRIBUTE_CODES,
        }
    }
}

static ATTRIBUTE_CONSTANTS: &[(FileAttributes, &str)] = &[
    (FileAttributes::READONLY, "FILE_ATTRIBUTE_READONLY"),
    (FileAttributes::HIDDEN, "FILE_ATTRIBUTE_HIDDEN"),
    (FileAttributes::SYSTEM, "FILE_ATTRIBUTE_SYSTEM"),
    (FileAttributes::DIRECTORY, "FILE_ATTRIBUTE_DIRECTORY"),
    (FileAttributes::ARCHIVE, "FILE_ATTRIBUTE_ARCHIVE"),
    (FileAttributes::DEVICE, "FILE_ATTRIBUTE_DEVICE"),
    (FileAttributes::NORMAL, "FILE_ATTRIBUTE_NORMAL"),
    (FileAttributes::TEMPORARY, "FILE_ATTRIBUTE_TEMPORARY"),
    (FileAttributes::SPARSE_FILE, "FILE_ATTRIBUTE_SPARSE_FILE"),
    (FileAttributes::REPARSE_POINT, "FILE_ATTRIBUTE_REPARSE_POINT"),
    (FileAttributes::COMPRESSED, "FILE_ATTRIBUTE_COMPRESSED"),
    (FileAttributes::OFFLINE, "FILE_ATTRIBUTE_OFFLINE"),
    (FileAttributes::NOT_CONTENT_INDEXED, "FILE_ATTRIBUTE_NOT_CONTENT_INDEXED"),
    (FileAttributes::ENCRYPTED, "FILE_ATTRIBUTE_ENCRYPTED"),
    (FileAttributes::INTEGRITY_STREAM, "FILE_ATTRIBUTE_INTEGRITY_STREAM"),
    (FileAttributes::VIRTUAL, "FILE_ATTRIBUTE_VIRTUAL"),
    (FileAttributes::NO_SCRUB_DATA, "FILE_ATTRIBUTE_NO_SCRUB_DATA"),
    (FileAttributes::RECALL_ON_OPEN, "FILE_ATTRIBUTE_RECALL_ON_OPEN"),
    (FileAttributes::RECALL_ON_DATA_ACCESS, "FILE_ATTRIBUTE_RECALL_ON_DATA_ACCESS"),
];

static ATTRIBUTE_NAMES: &[(FileAttributes, &str)] = &[
    (FileAttributes::READONLY, "Readonly"),
    (FileAttributes::HIDDEN, "Hidden"),
    (FileAttributes::SYSTEM, "System"),
    (FileAttributes::DIRECTORY, "Directory"),
    (FileAttributes::ARCHIVE, "Archive"),
    (FileAttributes::DEVICE, "Device"),
    (FileAttributes::NORMAL, "Normal"),
    (FileAttributes::TEMPORARY, "Temporary"),
    (FileAttributes::SPARSE_FILE, "SparseFile"),
    (FileAttributes::REPARSE_POINT, "ReparsePoint"),
    (FileAttributes::COMPRESSED, "Compressed"),
    (FileAttributes::OFFLINE, "Offline"),
    (FileAttributes::NOT_CONTENT_INDEXED, "NotContentIndexed"),
    (FileAttributes::ENCRYPTED, "Encrypted"),
    (FileAttributes::INTEGRITY_STREAM, "IntegrityStream"),
    (FileAttributes::VIRTUAL, "Virtual"),
    (FileAttributes::NO_SCRUB_DATA, "NoScrubData"),
    (FileAttributes::RECALL_ON_OPEN, "RecallOnOpen"),
    (FileAttributes::RECALL_ON_DATA_ACCESS, "RecallOnDataAccess"),
];

// Letters follow Explorer's attribute column; the unofficial ones fill gaps.
static ATTRIBUTE_CODES: &[(FileAttributes, &str)] = &[
    (FileAttributes::READONLY, "R"),
    (FileAttributes::HIDDEN, "H"),
    (FileAttributes::SYSTEM, "S"),
    (FileAttributes::DIRECTORY, "D"),
    (FileAttributes::ARCHIVE, "A"),
    (FileAttributes::DEVICE, "^"),
    (FileAttributes::NORMAL, "N"),
    (FileAttributes::TEMPORARY, "T"),
    (FileAttributes::SPARSE_FILE, "P"),
    (FileAttributes::REPARSE_POINT, "L"),
    (FileAttributes::COMPRESSED, "C"),
    (FileAttributes::OFFLINE, "O"),
    (FileAttributes::NOT_CONTENT_INDEXED, "I"),
    (FileAttributes::ENCRYPTED, "E"),
    (FileAttributes::INTEGRITY_STREAM, "V"),
    (FileAttributes::VIRTUAL, "-"),
    (FileAttributes::NO_SCRUB_DATA, "X"),
    (FileAttributes::RECALL_ON_OPEN, "!"),
    (FileAttributes::RECALL_ON_DATA_ACCESS, "?"),
];

/// Where a journal record came from (`USN_SOURCE_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct SourceInfo(pub u32);

impl SourceInfo {
    pub const LOCAL: SourceInfo = SourceInfo(0);
    pub const DATA_MANAGEMENT: SourceInfo = SourceInfo(0x0000_0001);
    pub const AUXILIARY_DATA: SourceInfo = SourceInfo(0x0000_0002);
    pub const REPLICATION_MANAGEMENT: SourceInfo = SourceInfo(0x0000_0004);
    pub const CLIENT_REPLICATION_MANAGEMENT: SourceInfo = SourceInfo(0x0000_0008);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: SourceInfo) -> bool {
        self.0 & other.0 == other.0
    }

    /// Short labels (`LOCAL`, `OS`, `AUX`, `REPL`, `CLOUD`) joined by `sep`.
    pub fn join(self, sep: &str) -> String {
        if self == SourceInfo::LOCAL {
            return "LOCAL".to_string();
        }
        SOURCE_LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl BitOr for SourceInfo {
    type Output = SourceInfo;
    fn bitor(self, rhs: SourceInfo) -> SourceInfo {
        SourceInfo(self.0 | rhs.0)
    }
}

static SOURCE_LABELS: &[(SourceInfo, &str)] = &[
    (SourceInfo::DATA_MANAGEMENT, "OS"),
    (SourceInfo::AUXILIARY_DATA, "AUX"),
    (SourceInfo::REPLICATION_MANAGEMENT, "REPL"),
    (SourceInfo::CLIENT_REPLICATION_MANAGEMENT, "CLOUD"),
];

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_join() {
        let attrs = FileAttributes::HIDDEN | FileAttributes::DIRECTORY;
        assert_eq!(attrs.join("", AttributeFormat::Code), "HD");
        assert_eq!(attrs.to_string(), "Hidden|Directory");
        assert_eq!(
            FileAttributes::ARCHIVE.join("|", AttributeFormat::Constant),
            "FILE_ATTRIBUTE_ARCHIVE"
        );
        assert!(attrs.is_dir());
        assert!(!FileAttributes::ARCHIVE.is_dir());
    }

    #[test]
    fn test_source_info() {
        assert_eq!(SourceInfo::LOCAL.to_string(), "LOCAL");
        assert_eq!(
            (SourceInfo::DATA_MANAGEMENT | SourceInfo::CLIENT_REPLICATION_MANAGEMENT).join("|"),
            "OS|CLOUD"
        );
    }
}
