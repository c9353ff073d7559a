//! # pkgsync-storage
//!
//! Collaborator contracts for the package reconciler.
//!
//! This crate defines the traits the reconciler talks to and the value types
//! flowing through them. It does not contain any implementations - those are
//! provided by separate crates (see `pkgsync-db-memory`).
//!
//! ## Overview
//!
//! - [`ObjectStore`] - find/create/save/remove of live entities, plus bulk
//!   variants used for relation tables
//! - [`SchemaIntrospector`] and [`SchemaManager`] - live table structure and DDL
//! - [`ModelRegistry`] - declared model metadata of package classes
//! - [`ExtensionRegistry`] - extension-package registration
//! - [`ResourceService`] - the host's resource create/update pipeline
//! - [`CacheInvalidator`] - end-of-run cache refresh
//!
//! ## Implementing a backend
//!
//! ```ignore
//! use async_trait::async_trait;
//! use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, StorageError};
//!
//! struct MyStore {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl ObjectStore for MyStore {
//!     async fn get(&self, kind: EntityKind, criteria: &Criteria) -> Result<Option<Entity>, StorageError> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::StorageError;
pub use traits::{
    CacheInvalidator, ExtensionRegistry, ModelRegistry, ObjectStore, ResourceService,
    SchemaIntrospector, SchemaManager,
};
pub use types::{CachePartition, Condition, Criteria, Entity, EntityKind};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Name of the primary-key index, never dropped or re-added by schema sync.
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// Prelude module for convenient imports.
///
/// ```ignore
/// use pkgsync_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::StorageError;
    pub use crate::traits::{
        CacheInvalidator, ExtensionRegistry, ModelRegistry, ObjectStore, ResourceService,
        SchemaIntrospector, SchemaManager,
    };
    pub use crate::types::{CachePartition, Criteria, Entity, EntityKind};
    pub use crate::{PRIMARY_INDEX, StorageResult};
}
