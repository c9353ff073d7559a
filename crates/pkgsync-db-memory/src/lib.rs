//! In-memory collaborators for pkgsync.
//!
//! This crate implements every trait of `pkgsync-storage` in memory: the
//! object store uses a papaya lock-free HashMap, the rest keep their state
//! behind tokio locks. It backs the reconciler's tests and dry runs.
//!
//! # Example
//!
//! ```ignore
//! use pkgsync_db_memory::create_backend;
//! use pkgsync_storage::{EntityKind, ObjectStore};
//!
//! let backend = create_backend();
//! let mut menu = backend.store.create(EntityKind::Menu).with("text", "blog.menu");
//! backend.store.save(&mut menu).await?;
//! ```

mod cache;
mod extensions;
pub mod factory;
mod resources;
pub mod schema;
pub mod store;

pub use cache::RecordingCache;
pub use extensions::{ExtensionEntry, InMemoryExtensions};
pub use factory::{InMemoryBackend, create_backend};
pub use resources::InMemoryResourceService;
pub use schema::{InMemorySchema, RegisteredPackage, SchemaOp, TableShape};
pub use store::{InMemoryStore, StoreKey};

// Re-export the storage contracts for convenience
pub use pkgsync_storage::{ObjectStore, StorageError};
