//! # usnkit Windows NTFS Backend
//!
//! This crate implements `usnkit_core::JournalDevice` for NTFS volumes on
//! Windows, using `DeviceIoControl` with the change journal control codes:
//!
//! - `FSCTL_QUERY_USN_JOURNAL` and `FSCTL_CREATE_USN_JOURNAL`
//! - `FSCTL_READ_USN_JOURNAL` for journal cursors and monitors
//! - `FSCTL_ENUM_USN_DATA` for master file table enumeration
//!
//! ## Architecture
//!
//! - `device.rs`: The `VolumeDevice` journal device
//! - `wire.rs`: Control code input and output layouts
//! - `path.rs`: Volume path normalization
//! - `winapi_utils.rs`: Low-level Windows API wrappers
//!
//! ## Permissions
//!
//! Opening a volume requires elevated privileges:
//! - The process should be run as Administrator, OR
//! - The user should have "Perform Volume Maintenance Tasks" privilege
//!
//! Access failures are reported as `DeviceError::AccessDenied`.

#[cfg(windows)]
mod device;
#[cfg(windows)]
mod winapi_utils;

#[cfg(windows)]
pub use device::VolumeDevice;

#[cfg(not(windows))]
mod stub;

#[cfg(not(windows))]
pub use stub::VolumeDevice;

/// Error types specific to the NTFS backend
pub mod error;
pub mod path;
pub mod wire;

pub use error::VolumeError;
pub use path::normalize_volume_path;
