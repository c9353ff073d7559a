use thiserror::Error;

/// Errors produced while turning a descriptor document into a [`PackageDescriptor`].
///
/// [`PackageDescriptor`]: crate::PackageDescriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("JSON config file is not valid: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The document parsed, but its structure is invalid. Every problem found
    /// is listed, not only the first one.
    #[error("Invalid package descriptor: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },
}

impl DescriptorError {
    /// Create a new Invalid error from a list of problems
    pub fn invalid(problems: Vec<String>) -> Self {
        Self::Invalid { problems }
    }

    /// Problems reported by structural validation (empty for JSON errors).
    pub fn problems(&self) -> &[String] {
        match self {
            Self::Invalid { problems } => problems,
            Self::InvalidJson(_) => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, DescriptorError>;
