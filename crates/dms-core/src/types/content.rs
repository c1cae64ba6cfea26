//! Content backend discriminator and opaque content references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which content backend a storage writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveType {
    /// Blob table embedded in the host database.
    #[default]
    Database,
    /// Files on a local or mounted filesystem.
    File,
}

impl SaveType {
    /// Return the save type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::File => "file",
        }
    }
}

impl fmt::Display for SaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SaveType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "database" => Ok(Self::Database),
            "file" => Ok(Self::File),
            _ => Err(AppError::validation(format!(
                "Invalid save type: '{s}'. Expected one of: database, file"
            ))),
        }
    }
}

/// Reference to stored bytes. The `backend` discriminator records which
/// backend produced it so mixed backends can coexist during a migration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    /// Backend that holds the bytes.
    pub backend: SaveType,
    /// Backend-specific opaque key.
    pub key: String,
}

impl ContentRef {
    /// Create a reference for the given backend and key.
    pub fn new(backend: SaveType, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.key)
    }
}
