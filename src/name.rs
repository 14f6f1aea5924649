//! Name normalization utilities for Python wheels (PEP 427, PEP 503)

use crate::error::WheelError;

fn collapse_separators(name: &str, separator: char) -> String {
    let mut result = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !in_separator {
                result.push(separator);
                in_separator = true;
            }
        } else {
            result.extend(c.to_lowercase());
            in_separator = false;
        }
    }

    result
}

/// Normalize a package name for use in wheel filenames and dist-info directories.
///
/// Lowercases the name and collapses runs of `-`, `_` and `.` into a single
/// underscore, which is the escaped form PEP 427 uses inside filenames.
pub fn normalize_dist_info_name(name: &str) -> String {
    collapse_separators(name, '_')
}

/// Canonical distribution name as written into METADATA (`My.Package` -> `my-package`).
pub fn canonicalize_name(name: &str) -> String {
    collapse_separators(name, '-')
}

/// Check that a distribution name is acceptable for a rename.
///
/// Names must consist of ASCII letters, digits, `.`, `_` and `-`, and must
/// start and end with a letter or digit.
pub fn validate_name(name: &str) -> Result<(), WheelError> {
    if name.is_empty() {
        return Err(WheelError::invalid_name(name, "name is empty"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(WheelError::invalid_name(
            name,
            format!("character '{}' is not allowed", c),
        ));
    }
    let bytes = name.as_bytes();
    if !bytes[0].is_ascii_alphanumeric() || !bytes[bytes.len() - 1].is_ascii_alphanumeric() {
        return Err(WheelError::invalid_name(
            name,
            "must start and end with a letter or digit",
        ));
    }
    Ok(())
}

/// Compute the dist-info directory name from package name and version
pub fn dist_info_name(name: &str, version: &str) -> String {
    format!("{}-{}.dist-info", normalize_dist_info_name(name), version)
}
