use std::path::{Path, PathBuf};

use config::{Config, Environment, File};

use crate::{ConfigError, SyncConfig};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "pkgsync.toml";

/// Loads configuration from `path` (or [`DEFAULT_CONFIG_FILE`]) merged with
/// environment overrides, e.g. `PKGSYNC__PACKAGES__PACKAGES_DIR=/srv/packages`.
///
/// A missing file is not an error: defaults and environment still apply.
pub fn load_config(path: Option<&str>) -> Result<SyncConfig, ConfigError> {
    let mut builder = Config::builder();
    let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
    if file.exists() {
        builder = builder.add_source(File::from(file));
    }
    builder = builder.add_source(
        Environment::with_prefix("PKGSYNC")
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder
        .build()
        .map_err(|e| ConfigError::parse(format!("config build error: {e}")))?;
    let merged: SyncConfig = cfg
        .try_deserialize()
        .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))?;
    merged.validate()?;
    Ok(merged)
}

pub fn load_config_with_default_path<P: AsRef<Path>>(
    path: Option<P>,
) -> Result<SyncConfig, ConfigError> {
    let p = path
        .as_ref()
        .map(|p| p.as_ref().to_string_lossy().to_string());
    load_config(p.as_deref())
}
