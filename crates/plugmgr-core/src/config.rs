//! Manager configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! plugin_suffix = ".so"
//! identity_symbol = "plugmgr_plugin_identity"
//! version_match = "exact"
//!
//! [api_version]
//! major = 1
//! minor = 0
//! ```

use std::fmt::{self, Display, Formatter};
use std::path::Path;

use plugmgr_sdk::abi::{DEFAULT_IDENTITY_SYMBOL, PLUGIN_API_MAJOR_VERSION, PLUGIN_API_MINOR_VERSION};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::version::VersionMatch;

/// A (major, minor) API version pair.
///
/// A field missing from a config file takes the SDK default for that field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVersion {
    pub major: i32,
    pub minor: i32,
}

impl ApiVersion {
    pub const fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::new(PLUGIN_API_MAJOR_VERSION, PLUGIN_API_MINOR_VERSION)
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Configuration for a [`PluginManager`](crate::PluginManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Baseline version plugins are checked against
    pub api_version: ApiVersion,

    /// File-name suffix a directory entry must carry to be loaded
    pub plugin_suffix: String,

    /// Exported symbol of the identity entry point
    pub identity_symbol: String,

    /// Built-in compatibility rule
    pub version_match: VersionMatch,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::default(),
            plugin_suffix: std::env::consts::DLL_SUFFIX.to_string(),
            identity_symbol: DEFAULT_IDENTITY_SYMBOL.to_string(),
            version_match: VersionMatch::default(),
        }
    }
}

impl ManagerConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_api_version(mut self, major: i32, minor: i32) -> Self {
        self.api_version = ApiVersion::new(major, minor);
        self
    }

    pub fn with_plugin_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.plugin_suffix = suffix.into();
        self
    }

    pub fn with_identity_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.identity_symbol = symbol.into();
        self
    }

    pub fn with_version_match(mut self, version_match: VersionMatch) -> Self {
        self.version_match = version_match;
        self
    }

    /// Whether `file_name` carries the configured plugin suffix.
    pub fn is_plugin_file_name(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.plugin_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.api_version, ApiVersion::new(1, 0));
        assert_eq!(config.plugin_suffix, std::env::consts::DLL_SUFFIX);
        assert_eq!(config.identity_symbol, "plugmgr_plugin_identity");
        assert_eq!(config.version_match, VersionMatch::Exact);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ManagerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = ManagerConfig::from_toml_str(
            r#"
            plugin_suffix = ".plugin"
            version_match = "major"

            [api_version]
            major = 3
            minor = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.api_version, ApiVersion::new(3, 2));
        assert_eq!(config.plugin_suffix, ".plugin");
        assert_eq!(config.version_match, VersionMatch::Major);
        assert_eq!(config.identity_symbol, "plugmgr_plugin_identity");
    }

    #[test]
    fn test_api_version_table_with_major_only() {
        let config = ManagerConfig::from_toml_str("[api_version]\nmajor = 2\n").unwrap();
        assert_eq!(config.api_version, ApiVersion::new(2, 0));

        let config = ManagerConfig::from_toml_str("api_version = { minor = 4 }").unwrap();
        assert_eq!(config.api_version, ApiVersion::new(1, 4));
    }

    #[test]
    fn test_invalid_toml() {
        let result = ManagerConfig::from_toml_str("plugin_suffix = 12");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ManagerConfig::from_file("/nonexistent/plugmgr.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_suffix_match() {
        let config = ManagerConfig::default().with_plugin_suffix(".dll");
        assert!(config.is_plugin_file_name("codec.dll"));
        assert!(!config.is_plugin_file_name("codec.dll.txt"));
        assert!(!config.is_plugin_file_name("readme"));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(ApiVersion::new(4, 11).to_string(), "4.11");
    }
}
