//! Write-time content policy: size limit and forbidden extensions.

use std::collections::BTreeSet;

use dms_core::config::content::ContentConfig;
use dms_core::error::AppError;
use dms_core::result::AppResult;

use crate::mime;

/// Limits checked before any content is stored.
#[derive(Debug, Clone, Default)]
pub struct ContentPolicy {
    /// Maximum decoded size in bytes, `0` for unlimited.
    max_size_bytes: u64,
    /// Lowercase extensions without dots.
    forbidden_extensions: BTreeSet<String>,
}

impl ContentPolicy {
    /// Build the policy from configuration.
    pub fn from_config(config: &ContentConfig) -> Self {
        Self {
            max_size_bytes: config.max_upload_size_bytes,
            forbidden_extensions: config
                .forbidden_extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Fail if the decoded content exceeds the configured maximum.
    pub fn check_size(&self, content: &[u8]) -> AppResult<()> {
        let size = content.len() as u64;
        if self.max_size_bytes > 0 && size > self.max_size_bytes {
            return Err(AppError::validation(format!(
                "Content of {size} bytes exceeds the maximum of {} bytes",
                self.max_size_bytes
            )));
        }
        Ok(())
    }

    /// Fail if the extension derived from `name` is forbidden.
    pub fn check_extension(&self, name: &str) -> AppResult<()> {
        if let Some(ext) = mime::extension(name) {
            if self.forbidden_extensions.contains(&ext) {
                return Err(AppError::validation(format!(
                    "Files with extension '.{ext}' are not allowed"
                )));
            }
        }
        Ok(())
    }
}
