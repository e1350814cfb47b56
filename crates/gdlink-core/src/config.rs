//! Extension configuration
//!
//! Read from RON, typically embedded next to the library. Every field has a
//! default, so an empty `()` document is a valid configuration.

use crate::error::Result;
use crate::interface::InitializationLevel;
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};

/// Settings for one loaded extension library
///
/// # Example
///
/// ```
/// use gdlink_core::{ExtensionConfig, InitializationLevel};
///
/// let config = ExtensionConfig::from_ron(r#"(
///     library_name: "my_game",
///     minimum_level: Scene,
///     log_level: Some("debug"),
/// )"#).unwrap();
/// assert_eq!(config.library_name, "my_game");
/// assert_eq!(config.minimum_level, InitializationLevel::Scene);
/// assert!(config.verify_manifest);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Name used in log output
    pub library_name: String,

    /// Earliest initialization level the engine should call us at
    ///
    /// Wrapped classes are bound at `Scene`, so anything later than that
    /// delays the method table.
    pub minimum_level: InitializationLevel,

    /// Check every method spec against the bundled API manifest at startup
    pub verify_manifest: bool,

    /// Log level name (`trace` .. `error`); `None` defers to the environment
    pub log_level: Option<String>,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            library_name: "gdlink".to_string(),
            minimum_level: InitializationLevel::Scene,
            verify_manifest: true,
            log_level: None,
        }
    }
}

impl ExtensionConfig {
    /// Parse a RON document
    pub fn from_ron(source: &str) -> Result<Self> {
        Ok(ron::from_str(source)?)
    }

    /// Logging settings implied by this config
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_env().with_level_name(self.log_level.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tracing::Level;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ExtensionConfig::from_ron("()").unwrap();
        assert_eq!(config, ExtensionConfig::default());
        assert_eq!(config.minimum_level, InitializationLevel::Scene);
    }

    #[test]
    fn test_partial_document() {
        let config = ExtensionConfig::from_ron("(verify_manifest: false)").unwrap();
        assert!(!config.verify_manifest);
        assert_eq!(config.library_name, "gdlink");
    }

    #[test]
    fn test_bad_document() {
        let err = ExtensionConfig::from_ron("(minimum_level: Sometime)").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_log_level_from_config() {
        let config = ExtensionConfig {
            log_level: Some("warn".into()),
            ..Default::default()
        };
        assert_eq!(config.log_config().level, Level::WARN);
    }
}
