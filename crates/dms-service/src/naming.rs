//! Node name validation and sibling-unique name generation.

use std::collections::HashSet;

use dms_core::error::AppError;
use dms_core::result::AppResult;

/// Longest accepted name in bytes.
pub const MAX_NAME_LEN: usize = 255;

const FORBIDDEN_CHARS: &[char] = &['/', '\\', '<', '>', ':', '"', '|', '?', '*'];

/// Check that a name is safe to use as a single path component.
pub fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Name is longer than {MAX_NAME_LEN} bytes"
        )));
    }
    if name == "." || name == ".." {
        return Err(AppError::validation(format!("'{name}' is not a valid name")));
    }
    if name != name.trim() {
        return Err(AppError::validation(
            "Name cannot start or end with whitespace",
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(AppError::validation(format!(
            "Name '{}' contains the forbidden character {c:?}",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// Return `candidate` if no sibling uses it, else the first free
/// `name(n)` for `n = 1, 2, ...`. With `escape_suffix`, the counter goes
/// before the extension: `report.pdf` becomes `report(1).pdf`.
pub fn unique_name(candidate: &str, existing: &HashSet<String>, escape_suffix: bool) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }

    let (stem, suffix) = if escape_suffix {
        match candidate.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
            _ => (candidate, String::new()),
        }
    } else {
        (candidate, String::new())
    };

    (1u64..)
        .map(|n| format!("{stem}({n}){suffix}"))
        .find(|name| !existing.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}
