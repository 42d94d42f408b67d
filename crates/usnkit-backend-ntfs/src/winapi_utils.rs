//! Low-level Windows API utilities.
//!
//! All unsafe code for Windows API calls is concentrated here.

use crate::error::last_device_error;
use std::ffi::{c_void, OsStr};
use std::os::windows::ffi::OsStrExt;
use usnkit_core::DeviceError;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_GENERIC_READ, FILE_GENERIC_WRITE, FILE_SHARE_DELETE,
    FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::IO::DeviceIoControl;

/// Convert a Rust string to a null-terminated wide string (UTF-16).
pub fn to_wide_string(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Open a volume for journal access and return the raw handle value.
///
/// Write access is requested because creating a journal needs it; the
/// journal itself is never modified otherwise.
pub fn open_volume(device_path: &str) -> Result<isize, DeviceError> {
    let wide_path = to_wide_string(device_path);

    // SAFETY: wide_path is null-terminated and outlives the call.
    let handle = unsafe {
        CreateFileW(
            PCWSTR(wide_path.as_ptr()),
            FILE_GENERIC_READ.0 | FILE_GENERIC_WRITE.0,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            None,
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            None,
        )
    };

    match handle {
        Ok(h) if h != INVALID_HANDLE_VALUE && !h.0.is_null() => Ok(h.0 as isize),
        _ => Err(last_device_error()),
    }
}

/// Issue one control code. Returns the number of bytes written to `output`.
pub fn ioctl(
    raw: isize,
    code: u32,
    input: Option<&[u8]>,
    output: &mut [u8],
) -> Result<usize, DeviceError> {
    let mut bytes_returned = 0u32;
    let (in_ptr, in_len) = match input {
        Some(bytes) => (Some(bytes.as_ptr() as *const c_void), bytes.len() as u32),
        None => (None, 0),
    };
    let (out_ptr, out_len) = if output.is_empty() {
        (None, 0)
    } else {
        (
            Some(output.as_mut_ptr() as *mut c_void),
            output.len() as u32,
        )
    };

    // SAFETY: the pointers and lengths come from live slices.
    let result = unsafe {
        DeviceIoControl(
            HANDLE(raw as *mut c_void),
            code,
            in_ptr,
            in_len,
            out_ptr,
            out_len,
            Some(&mut bytes_returned),
            None,
        )
    };

    match result {
        Ok(()) => Ok(bytes_returned as usize),
        Err(_) => Err(last_device_error()),
    }
}

/// Close a handle returned by [`open_volume`].
pub fn close_handle(raw: isize) {
    // SAFETY: called exactly once per opened handle.
    unsafe {
        let _ = CloseHandle(HANDLE(raw as *mut c_void));
    }
}
