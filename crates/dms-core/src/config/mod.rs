//! Configuration schemas.
//!
//! All configuration structs are deserialized through the `config` crate
//! from TOML files and `DMS__*` environment variables. Each sub-module
//! represents a logical configuration section.

pub mod content;
pub mod logging;
pub mod notification;

use serde::{Deserialize, Serialize};

use self::content::ContentConfig;
use self::logging::LoggingConfig;
use self::notification::NotificationConfig;

use crate::error::AppError;

/// Root configuration.
///
/// The top-level deserialization target for the merged configuration
/// (default.toml + environment overlay + environment variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmsConfig {
    /// Content backend and upload policy settings.
    #[serde(default)]
    pub content: ContentConfig,
    /// Change-notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DmsConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default` with an environment-specific overlay and
    /// environment variables prefixed with `DMS__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DMS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("content.forbidden_extensions")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
