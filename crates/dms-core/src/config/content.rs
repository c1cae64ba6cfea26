//! Content backend and upload policy configuration.

use serde::{Deserialize, Serialize};

use crate::types::SaveType;

/// Top-level content configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Maximum decoded content size in bytes (`0` disables the check).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Extensions that may never be written (case-insensitive, no dot).
    #[serde(default)]
    pub forbidden_extensions: Vec<String>,
    /// Backend used for new storages when none is specified.
    #[serde(default = "default_save_type")]
    pub default_save_type: SaveType,
    /// Local filesystem backend configuration.
    #[serde(default)]
    pub local: LocalContentConfig,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_upload_size_bytes: default_max_upload(),
            forbidden_extensions: Vec::new(),
            default_save_type: default_save_type(),
            local: LocalContentConfig::default(),
        }
    }
}

/// Local filesystem backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalContentConfig {
    /// Root path for stored content.
    #[serde(default = "default_local_root")]
    pub root_path: String,
}

impl Default for LocalContentConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
        }
    }
}

fn default_max_upload() -> u64 {
    26_214_400 // 25 MiB
}

fn default_save_type() -> SaveType {
    SaveType::Database
}

fn default_local_root() -> String {
    "./data/content".to_string()
}
