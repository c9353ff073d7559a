use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub packages: PackagesConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packages.config_path.trim().is_empty() {
            return Err(ConfigError::validation("packages.config_path must not be empty"));
        }
        if Path::new(&self.packages.config_path).is_absolute() {
            return Err(ConfigError::validation(
                "packages.config_path must be relative to the package folder",
            ));
        }
        let map_file = &self.packages.resource_map_file;
        if map_file.trim().is_empty() || map_file.contains('/') || map_file.contains('\\') {
            return Err(ConfigError::validation(
                "packages.resource_map_file must be a plain file name",
            ));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesConfig {
    /// Folder holding one sub-folder per package. Unset means packages cannot be updated.
    #[serde(default)]
    pub packages_dir: Option<PathBuf>,
    /// Descriptor location inside a package folder.
    #[serde(default = "default_config_path")]
    pub config_path: String,
    /// File name of the resource identity map, inside the package assets folder.
    #[serde(default = "default_resource_map_file")]
    pub resource_map_file: String,
}

fn default_config_path() -> String {
    "_build/config.json".into()
}

fn default_resource_map_file() -> String {
    "resourcemap.json".into()
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            packages_dir: None,
            config_path: default_config_path(),
            resource_map_file: default_resource_map_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Materialize code elements as includes of the package sources.
    #[serde(default)]
    pub enable_debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Id of the site start resource, which is never removed.
    #[serde(default = "default_site_start")]
    pub site_start: u64,
}

fn default_site_start() -> u64 {
    1
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_start: default_site_start(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = SyncConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.packages.packages_dir.is_none());
        assert_eq!(cfg.packages.config_path, "_build/config.json");
        assert_eq!(cfg.site.site_start, 1);
        assert!(!cfg.debug.enable_debug);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut cfg = SyncConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = SyncConfig::default();
        cfg.packages.resource_map_file = "maps/resourcemap.json".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("resource_map_file"));

        let mut cfg = SyncConfig::default();
        cfg.packages.config_path = "/etc/config.json".into();
        assert!(cfg.validate().is_err());
    }
}
