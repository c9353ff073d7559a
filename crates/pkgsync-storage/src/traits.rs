//! Collaborator traits.
//!
//! Reconcilers never reach for ambient global state: every live-store
//! interaction goes through one of these traits, passed in by reference.
//! Implementations must be thread-safe (`Send + Sync`).

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::types::{CachePartition, Criteria, Entity, EntityKind};

/// Generic entity persistence.
///
/// # Example
///
/// ```ignore
/// use pkgsync_storage::{Criteria, EntityKind, ObjectStore, StorageError};
///
/// async fn find_or_create_menu(store: &dyn ObjectStore, text: &str) -> Result<u64, StorageError> {
///     if let Some(menu) = store.get(EntityKind::Menu, &Criteria::new().eq("text", text)).await? {
///         return Ok(menu.id_or_zero());
///     }
///     let mut menu = store.create(EntityKind::Menu);
///     menu.set("text", text);
///     store.save(&mut menu).await?;
///     Ok(menu.id_or_zero())
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the first entity (lowest id) of `kind` matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing entities.
    async fn get(&self, kind: EntityKind, criteria: &Criteria)
    -> Result<Option<Entity>, StorageError>;

    /// Returns every entity of `kind` matching `criteria`, ordered by id.
    async fn find_all(
        &self,
        kind: EntityKind,
        criteria: &Criteria,
    ) -> Result<Vec<Entity>, StorageError>;

    /// Returns a fresh, unsaved entity of `kind`.
    fn create(&self, kind: EntityKind) -> Entity {
        Entity::new(kind)
    }

    /// Persists the entity, assigning an id on first save.
    async fn save(&self, entity: &mut Entity) -> Result<(), StorageError>;

    /// Removes the entity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the entity is not (or no longer) stored.
    async fn remove(&self, entity: &Entity) -> Result<(), StorageError>;

    /// Sets `changes` on every entity of `kind` matching `criteria`.
    ///
    /// Returns the number of entities touched.
    async fn update_where(
        &self,
        kind: EntityKind,
        criteria: &Criteria,
        changes: &Map<String, Value>,
    ) -> Result<usize, StorageError>;

    /// Removes every entity of `kind` matching `criteria`.
    ///
    /// Returns the number of entities removed.
    async fn remove_where(&self, kind: EntityKind, criteria: &Criteria)
    -> Result<usize, StorageError>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

/// Live introspection of the relational schema.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Lists the live columns of the table backing `table`, in table order.
    async fn list_columns(&self, table: &str) -> Result<Vec<String>, StorageError>;

    /// Lists the live non-primary indexes of the table backing `table`.
    async fn list_indexes(&self, table: &str) -> Result<Vec<String>, StorageError>;
}

/// DDL operations on model tables.
///
/// `table` is always a model class identifier; mapping it to a physical
/// table name (prefix included) is the implementation's concern.
#[async_trait]
pub trait SchemaManager: Send + Sync {
    /// Creates the table from its declared field metadata. No-op if it exists.
    async fn create_table(&self, table: &str) -> Result<(), StorageError>;

    /// Drops the table. No-op if it does not exist.
    async fn drop_table(&self, table: &str) -> Result<(), StorageError>;

    async fn add_column(&self, table: &str, column: &str) -> Result<(), StorageError>;

    /// Alters a live column to match its declared type and attributes.
    async fn alter_column(&self, table: &str, column: &str) -> Result<(), StorageError>;

    async fn drop_column(&self, table: &str, column: &str) -> Result<(), StorageError>;

    async fn add_index(&self, table: &str, index: &str) -> Result<(), StorageError>;

    async fn drop_index(&self, table: &str, index: &str) -> Result<(), StorageError>;
}

/// Declared model metadata for package classes.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Makes the classes of a package model available under `namespace`.
    async fn register_package(
        &self,
        namespace: &str,
        model_path: &str,
        table_prefix: &str,
    ) -> Result<(), StorageError>;

    /// Loads a class that has no table of its own.
    async fn load_class(&self, class: &str) -> Result<(), StorageError>;

    /// Declared column names of `table`, in declaration order.
    async fn field_meta(&self, table: &str) -> Result<Vec<String>, StorageError>;

    /// Declared index names of `table`, including `PRIMARY` if declared.
    async fn index_meta(&self, table: &str) -> Result<Vec<String>, StorageError>;
}

/// Registration of package models as host extension packages.
#[async_trait]
pub trait ExtensionRegistry: Send + Sync {
    async fn add_extension_package(
        &self,
        namespace: &str,
        model_path: &str,
        options: &Map<String, Value>,
    ) -> Result<(), StorageError>;

    async fn remove_extension_package(&self, namespace: &str) -> Result<(), StorageError>;
}

/// The host's resource create/update pipeline.
///
/// Resources are not written through [`ObjectStore::save`] because the host
/// performs alias generation, URI building and validation on the way in.
#[async_trait]
pub trait ResourceService: Send + Sync {
    /// Creates a resource from a flattened payload and returns the persisted entity.
    async fn create_resource(&self, payload: &Map<String, Value>) -> Result<Entity, StorageError>;

    /// Updates resource `id` from a flattened payload and returns the persisted entity.
    async fn update_resource(
        &self,
        id: u64,
        payload: &Map<String, Value>,
    ) -> Result<Entity, StorageError>;

    /// Writes the value of the typed field `field` on resource `resource_id`.
    async fn set_field_value(
        &self,
        resource_id: u64,
        field: &str,
        value: &Value,
    ) -> Result<(), StorageError>;
}

/// Host cache invalidation.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, partitions: &[CachePartition]) -> Result<(), StorageError>;
}
