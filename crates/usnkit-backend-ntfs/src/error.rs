//! Error types for the NTFS backend.

use thiserror::Error;
use usnkit_core::DeviceError;

// Win32 error codes the core reacts to
pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_HANDLE_EOF: u32 = 38;
pub const ERROR_NOT_SUPPORTED: u32 = 50;
pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
pub const ERROR_MORE_DATA: u32 = 234;
pub const ERROR_JOURNAL_DELETE_IN_PROGRESS: u32 = 1178;
pub const ERROR_JOURNAL_NOT_ACTIVE: u32 = 1179;
pub const ERROR_JOURNAL_ENTRY_DELETED: u32 = 1181;

/// Errors raised while opening a volume.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// The path does not name a volume
    #[error("invalid volume path: {path}")]
    InvalidPath { path: String },

    /// Failed to open a volume
    #[error("failed to open volume {volume}: {source}")]
    Open {
        volume: String,
        #[source]
        source: DeviceError,
    },

    /// Volume devices are only available on Windows
    #[error("NTFS volumes are only available on Windows")]
    Unsupported,
}

impl VolumeError {
    /// Check if this error indicates access was denied
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            VolumeError::Open {
                source: DeviceError::AccessDenied,
                ..
            }
        )
    }
}

/// Translate a Win32 error code into a device error.
///
/// `message` is only consulted for codes without a dedicated variant.
pub fn device_error(code: u32, message: impl FnOnce() -> String) -> DeviceError {
    match code {
        ERROR_ACCESS_DENIED => DeviceError::AccessDenied,
        ERROR_HANDLE_EOF => DeviceError::EndOfFile,
        ERROR_INSUFFICIENT_BUFFER | ERROR_MORE_DATA => DeviceError::InsufficientBuffer,
        ERROR_JOURNAL_DELETE_IN_PROGRESS => DeviceError::JournalDeleteInProgress,
        ERROR_JOURNAL_NOT_ACTIVE => DeviceError::JournalNotActive,
        ERROR_JOURNAL_ENTRY_DELETED => DeviceError::JournalEntryDeleted,
        ERROR_NOT_SUPPORTED => DeviceError::Unsupported(message()),
        code => DeviceError::Os {
            code,
            message: message(),
        },
    }
}

/// The calling thread's last Win32 error as a device error.
#[cfg(windows)]
pub fn last_device_error() -> DeviceError {
    use windows::Win32::Foundation::GetLastError;

    let code = unsafe { GetLastError().0 };
    device_error(code, || format_win32_error(code))
}

/// Format a Win32 error code to a human-readable message
#[cfg(windows)]
fn format_win32_error(code: u32) -> String {
    use windows::core::PWSTR;
    use windows::Win32::System::Diagnostics::Debug::{
        FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
    };

    let mut buffer = [0u16; 512];
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            None,
            code,
            0,
            PWSTR(buffer.as_mut_ptr()),
            buffer.len() as u32,
            None,
        )
    };

    if len == 0 {
        return format!("Unknown error ({})", code);
    }

    String::from_utf16_lossy(&buffer[..len as usize])
        .trim()
        .to_string()
}
