//! Error types for package reconciliation.

use std::path::PathBuf;

use pkgsync_core::DescriptorError;
use pkgsync_storage::StorageError;
use thiserror::Error;

/// Errors that abort a reconciliation run.
///
/// Every variant except [`ReconcileError::Storage`] is raised during
/// validation, before the live store is touched.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Folder for packages is not set. Set package folder in system settings.")]
    PackagesDirNotConfigured,

    #[error("Package {id} not found")]
    PackageNotFound { id: u64 },

    #[error("This package folder does not contain config file: {}", path.display())]
    DescriptorNotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON config file is not valid: {message}")]
    InvalidJson { message: String },

    #[error("{}", problems.join("; "))]
    InvalidDescriptor { problems: Vec<String> },

    /// The descriptor kept on the package record cannot be parsed.
    #[error("Installed package config is not valid: {message}")]
    InvalidInstalledDescriptor { message: String },

    #[error(
        "You can not update your package because you changed package's name ({installed} -> {incoming}). Please remove package and install it again."
    )]
    NameChanged { installed: String, incoming: String },

    #[error(
        "You can not update your package because you changed package's lowercase name ({installed} -> {incoming}). Please remove package and install it again."
    )]
    LowerCaseNameChanged { installed: String, incoming: String },

    #[error("Dependencies check failed! {}", missing_list(.missing))]
    MissingDependencies { missing: Vec<String> },

    #[error("Resource map {}: {message}", path.display())]
    ResourceMap { path: PathBuf, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn missing_list(missing: &[String]) -> String {
    missing
        .iter()
        .map(|name| format!("Package {name} not found!"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl ReconcileError {
    pub fn resource_map(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ResourceMap {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Converts an error parsing the incoming descriptor.
    pub fn from_incoming(err: DescriptorError) -> Self {
        match err {
            DescriptorError::InvalidJson(e) => Self::InvalidJson {
                message: e.to_string(),
            },
            DescriptorError::Invalid { problems } => Self::InvalidDescriptor { problems },
        }
    }

    /// Converts an error parsing the installed descriptor.
    pub fn from_installed(err: DescriptorError) -> Self {
        Self::InvalidInstalledDescriptor {
            message: err.to_string(),
        }
    }

    /// Returns true if the run was rejected before any mutation.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::ResourceMap { .. })
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
