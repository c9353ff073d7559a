//! # pkgsync-core
//!
//! Typed model of a package descriptor: the JSON document a package version
//! ships with, describing everything it installs into a site (settings, menus,
//! categories, elements, resources, database schema and dependencies).
//!
//! The reconciler compares two of these, the installed one and the incoming
//! one, and applies the difference to the live object store.

mod descriptor;
mod element;
mod error;
mod raw;

pub use descriptor::{
    Category, DatabaseSchema, Dependency, ExtensionPackageSpec, FieldValue, Menu,
    PackageDescriptor, ParentRef, Resource, Setting,
};
pub use element::{Element, ElementExtra, ElementKind, TypedFieldSpec, WidgetSpec, WidgetType};
pub use error::{DescriptorError, Result};
