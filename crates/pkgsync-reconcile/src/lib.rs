//! Package reconciliation.
//!
//! Given the descriptor of the installed version (kept on the package
//! record) and the descriptor found in the package folder, this crate
//! converges the live store to the new version:
//!
//! - **Schema** - drops, creates and optionally alters package tables
//! - **Menus, settings, extension package** - replaced or merged per key
//! - **Categories and elements** - found or created by natural key, old-only
//!   keys removed
//! - **Resources** - matched through a persisted title to id map
//!
//! [`PackageUpdater`] runs the phases in order. Each reconciler is also
//! usable on its own and talks to the host only through the
//! `pkgsync-storage` traits it receives.
//!
//! # Example
//!
//! ```ignore
//! use pkgsync_reconcile::{Collaborators, PackageUpdater, UpdateOptions};
//!
//! let updater = PackageUpdater::new(collaborators, config);
//! let report = updater.update(package_id, &UpdateOptions::default()).await?;
//! for (phase, failure) in report.failures() {
//!     eprintln!("{phase}: {} {}", failure.item, failure.error);
//! }
//! ```

pub mod categories;
mod context;
pub mod dependencies;
pub mod elements;
mod error;
pub mod extension;
pub mod menus;
pub mod orchestrator;
pub mod package;
mod report;
pub mod resource_map;
pub mod resources;
pub mod schema;
pub mod settings;

pub use categories::CategoryMap;
pub use context::{Collaborators, DynObjectStore};
pub use dependencies::check_dependencies;
pub use elements::{ElementContext, ElementSpec, Materialization};
pub use error::{ReconcileError, Result};
pub use orchestrator::{PackageUpdater, SyncPhase, UpdateOptions};
pub use package::{PackagePaths, PackageRecord};
pub use report::{ItemFailure, PhaseReport, ReconcileReport};
pub use resource_map::{FileResourceMapStore, ResourceMap, ResourceMapStore};
pub use schema::SchemaOptions;
