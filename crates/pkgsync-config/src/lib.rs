//! Host configuration for pkgsync.
//!
//! [`SyncConfig`] carries the few host settings the reconciler depends on:
//! where package folders live, whether elements are materialized in debug
//! mode, which resource is the site start page, and the log level. It is
//! loaded from a TOML file with `PKGSYNC__SECTION__KEY` environment
//! overrides, see [`loader::load_config`].

pub mod loader;
pub mod observability;
mod settings;

pub use settings::{DebugConfig, LoggingConfig, PackagesConfig, SiteConfig, SyncConfig};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
