//! Volume path normalization.

use crate::error::VolumeError;

/// Get the drive letter from a volume path like "\\?\C:", "C:" or "C:\".
pub fn extract_drive_letter(path: &str) -> Option<char> {
    let rest = path
        .strip_prefix("\\\\?\\")
        .or_else(|| path.strip_prefix("\\\\.\\"))
        .unwrap_or(path);
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => {
            match chars.as_str() {
                "" | "\\" | "/" => Some(letter),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Normalize a volume path to the format "\\.\X:" for device access.
pub fn normalize_volume_path(path: &str) -> Result<String, VolumeError> {
    extract_drive_letter(path.trim())
        .map(|letter| format!("\\\\.\\{}:", letter.to_ascii_uppercase()))
        .ok_or_else(|| VolumeError::InvalidPath {
            path: path.to_string(),
        })
}
