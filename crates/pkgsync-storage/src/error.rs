//! Storage error types for the collaborator contracts.
//!
//! Every collaborator (object store, schema manager, resource service, ...)
//! reports failures through [`StorageError`] so that reconcilers can record
//! them uniformly.

use crate::types::EntityKind;

/// Errors that can occur while talking to the live store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("Entity not found: {kind}/{id}")]
    NotFound {
        /// The kind of entity that was not found.
        kind: EntityKind,
        /// The id of the entity that was not found.
        id: u64,
    },

    /// The entity data is invalid for its kind.
    #[error("Invalid entity: {message}")]
    InvalidEntity {
        /// Description of why the entity is invalid.
        message: String,
    },

    /// A relational schema operation failed.
    #[error("Schema error on {table}: {message}")]
    Schema {
        /// The table (model class) the operation targeted.
        table: String,
        /// Description of the failure.
        message: String,
    },

    /// The resource create/update service rejected the payload.
    #[error("Resource service error: {message}")]
    ResourceService {
        /// Message returned by the service.
        message: String,
    },

    /// Failed to reach the backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: EntityKind, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Creates a new `InvalidEntity` error.
    #[must_use]
    pub fn invalid_entity(message: impl Into<String>) -> Self {
        Self::InvalidEntity {
            message: message.into(),
        }
    }

    /// Creates a new `Schema` error.
    #[must_use]
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ResourceService` error.
    #[must_use]
    pub fn resource_service(message: impl Into<String>) -> Self {
        Self::ResourceService {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found(EntityKind::Category, 12);
        assert_eq!(err.to_string(), "Entity not found: category/12");

        let err = StorageError::schema("BlogPost", "column exists");
        assert_eq!(err.to_string(), "Schema error on BlogPost: column exists");
    }

    #[test]
    fn test_is_not_found() {
        assert!(StorageError::not_found(EntityKind::Menu, 3).is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
    }
}
