//! Error types for usnkit core operations.
//!
//! Three layers of failure are kept apart so callers can react to each one
//! differently:
//!
//! - [`DecodeError`]: the bytes handed to the record codec are corrupt or
//!   truncated. Never repaired, always propagated.
//! - [`DeviceError`]: the journal device (the privileged I/O control layer)
//!   refused a request. Carried verbatim inside [`UsnError::Device`].
//! - [`UsnError`]: everything the core itself can report, including
//!   lifecycle misuse that is recoverable (a second `close`).
//!
//! End-of-data is not an error anywhere in this crate; iteration methods
//! return `Ok(None)` instead.

use std::fmt;
use thiserror::Error;

use crate::fileref::FileRef;

/// Result type alias using UsnError
pub type Result<T> = std::result::Result<T, UsnError>;

/// Why a declared record length was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthFault {
    /// The record claims to be zero bytes long
    Zero,
    /// The record is shorter than the fixed part of its version
    TooSmall { minimum: u32 },
    /// The record is longer than the configured maximum
    ExceedsMax { max: u32 },
}

impl fmt::Display for LengthFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthFault::Zero => write!(f, "length is zero"),
            LengthFault::TooSmall { minimum } => {
                write!(f, "shorter than the {} byte minimum", minimum)
            }
            LengthFault::ExceedsMax { max } => write!(f, "exceeds the {} byte maximum", max),
        }
    }
}

/// Failures while decoding a single change journal record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ends before the data the record needs
    #[error("record data truncated: need {needed} bytes, have {available}")]
    TruncatedInput { needed: usize, available: usize },

    /// The declared record length is not plausible (possible corruption)
    #[error("invalid record length {length}: {fault}")]
    InvalidLength { length: u32, fault: LengthFault },

    /// The record uses a layout this crate does not decode
    #[error("unsupported record version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// The file name range lies outside the declared record
    #[error("file name at offset {offset} (length {length}) exceeds record length {record_length}")]
    FileNameOutOfBounds {
        offset: u16,
        length: u16,
        record_length: u32,
    },
}

/// Errors reported by a journal device.
///
/// These are deliberately close to the underlying OS conditions. The core
/// only interprets `InsufficientBuffer` (retried with a larger buffer),
/// `EndOfFile` (end of table) and `JournalNotActive` (surfaced distinctly).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The output buffer cannot hold even a single record
    #[error("output buffer too small")]
    InsufficientBuffer,

    /// The volume has no active change journal
    #[error("change journal is not active")]
    JournalNotActive,

    /// The change journal is being deleted
    #[error("change journal deletion in progress")]
    JournalDeleteInProgress,

    /// The requested USN has been purged from the journal
    #[error("journal entry deleted (start USN too old)")]
    JournalEntryDeleted,

    /// The device has no more data for this request
    #[error("end of file")]
    EndOfFile,

    /// The caller lacks the privileges for the request
    #[error("access denied (try running as administrator)")]
    AccessDenied,

    /// The operation is not available on this platform or device
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// Any other OS error, untranslated
    #[error("OS error {code}: {message}")]
    Os { code: u32, message: String },
}

/// Device-level operations, used to give device errors context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    QueryJournal,
    ReadJournal,
    EnumTable,
    CreateJournal,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::QueryJournal => write!(f, "query journal"),
            Operation::ReadJournal => write!(f, "read journal"),
            Operation::EnumTable => write!(f, "enumerate file table"),
            Operation::CreateJournal => write!(f, "create journal"),
        }
    }
}

/// Core error types for usnkit operations.
#[derive(Error, Debug)]
pub enum UsnError {
    // === Decoding ===
    /// A record could not be decoded
    #[error("record decode failed: {0}")]
    Decode(#[from] DecodeError),

    // === Device ===
    /// A device operation failed
    #[error("{operation} failed on {resource}: {source}")]
    Device {
        operation: Operation,
        resource: String,
        #[source]
        source: DeviceError,
    },

    /// The volume has no active change journal (one may be created)
    #[error("change journal is not active on {resource}")]
    JournalNotActive { resource: String },

    // === Cursor ===
    /// A seek would move the cursor to a negative USN
    #[error("seek would result in a negative or out-of-range USN")]
    InvalidSeek,

    /// The seek origin is not supported
    #[error("unsupported seek origin")]
    InvalidWhence,

    // === Lifecycle ===
    /// The handle or monitor has already been closed
    #[error("already closed")]
    AlreadyClosed,

    /// The monitor is already running
    #[error("monitor is already running")]
    AlreadyRunning,

    /// The monitor is not running
    #[error("monitor is not running")]
    NotRunning,

    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    // === Lookup ===
    /// No record exists for the file reference
    #[error("file reference {0} not found")]
    NotFound(FileRef),

    /// The file reference cannot be used for this lookup
    #[error("file reference {0} does not fit in 64 bits")]
    UnsupportedFileRef(FileRef),

    // === Parsing ===
    /// A reason token was not recognized
    #[error("unsupported or unknown reason code: {token}")]
    InvalidReason { token: String },

    /// Invalid filter pattern (e.g., bad regex)
    #[error("invalid pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Configuration ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UsnError {
    /// Wrap a device error with the operation and resource it came from.
    ///
    /// `JournalNotActive` is lifted out so callers can offer to create one.
    pub fn device(operation: Operation, resource: impl Into<String>, source: DeviceError) -> Self {
        let resource = resource.into();
        match source {
            DeviceError::JournalNotActive => UsnError::JournalNotActive { resource },
            source => UsnError::Device {
                operation,
                resource,
                source,
            },
        }
    }

    /// Returns true if the volume has no active journal
    pub fn is_journal_not_active(&self) -> bool {
        matches!(self, UsnError::JournalNotActive { .. })
    }

    /// Returns true for a cache or table miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, UsnError::NotFound(_))
    }

    /// Returns true if this error indicates positions are no longer valid
    /// and a full rescan of the table is needed
    pub fn requires_rescan(&self) -> bool {
        matches!(
            self,
            UsnError::JournalNotActive { .. }
                | UsnError::Device {
                    source: DeviceError::JournalEntryDeleted | DeviceError::JournalDeleteInProgress,
                    ..
                }
        )
    }

    /// The underlying device error, if any
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            UsnError::Device { source, .. } => Some(source),
            UsnError::JournalNotActive { .. } => Some(&DeviceError::JournalNotActive),
            _ => None,
        }
    }
}
