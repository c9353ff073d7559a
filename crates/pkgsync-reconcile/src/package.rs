//! The live package record and the on-disk layout of a package folder.

use std::path::{Path, PathBuf};

use pkgsync_config::PackagesConfig;
use pkgsync_core::PackageDescriptor;
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore};
use time::OffsetDateTime;

use crate::error::{ReconcileError, Result};

/// Record of a package managed from a source folder.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRecord {
    pub id: u64,
    pub name: String,
    pub dir_name: String,
    /// Serialized descriptor of the installed version.
    pub config: String,
    pub version: String,
    pub description: String,
    /// Unix timestamp of the last successful update.
    pub updated_on: Option<i64>,
}

impl PackageRecord {
    /// Loads the record with the given id.
    pub async fn load(store: &dyn ObjectStore, id: u64) -> Result<Self> {
        let entity = store
            .get(EntityKind::Package, &Criteria::by_id(id))
            .await?
            .ok_or(ReconcileError::PackageNotFound { id })?;
        Ok(Self::from_entity(&entity))
    }

    pub fn from_entity(entity: &Entity) -> Self {
        let text = |field: &str| entity.get_str(field).unwrap_or_default().to_string();
        Self {
            id: entity.id_or_zero(),
            name: text("name"),
            dir_name: text("dir_name"),
            config: text("config"),
            version: text("version"),
            description: text("description"),
            updated_on: entity.get("updatedon").and_then(|v| v.as_i64()),
        }
    }

    /// Writes the installed version, description and serialized descriptor back.
    pub async fn store_update(
        store: &dyn ObjectStore,
        id: u64,
        descriptor: &PackageDescriptor,
        config: &str,
    ) -> Result<()> {
        let mut entity = store
            .get(EntityKind::Package, &Criteria::by_id(id))
            .await?
            .ok_or(ReconcileError::PackageNotFound { id })?;
        entity.set("version", descriptor.version.as_str());
        entity.set("description", descriptor.description.as_str());
        entity.set("config", config);
        entity.set("updatedon", OffsetDateTime::now_utc().unix_timestamp());
        store.save(&mut entity).await?;
        Ok(())
    }
}

/// Paths inside one package folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePaths {
    root: PathBuf,
    namespace: String,
    config_path: String,
    resource_map_file: String,
}

impl PackagePaths {
    pub fn new(packages_dir: &Path, dir_name: &str, packages: &PackagesConfig) -> Self {
        Self {
            root: packages_dir.join(dir_name),
            namespace: String::new(),
            config_path: packages.config_path.clone(),
            resource_map_file: packages.resource_map_file.clone(),
        }
    }

    /// Binds the paths to the package namespace (its lower-case name).
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor_file(&self) -> PathBuf {
        self.root.join(&self.config_path)
    }

    pub fn core_dir(&self) -> PathBuf {
        self.root.join("core").join("components").join(&self.namespace)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root
            .join("assets")
            .join("components")
            .join(&self.namespace)
    }

    pub fn resource_map_file(&self) -> PathBuf {
        self.assets_dir().join(&self.resource_map_file)
    }

    /// Core folder as a `/`-separated string with a trailing slash.
    pub fn core_path(&self) -> String {
        dir_string(&self.core_dir())
    }

    /// Folder holding the package model classes.
    pub fn model_path(&self) -> String {
        format!("{}model/", self.core_path())
    }
}

fn dir_string(path: &Path) -> String {
    let mut s = path.to_string_lossy().replace('\\', "/");
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_paths() {
        let paths = PackagePaths::new(Path::new("/srv/packages"), "blog", &PackagesConfig::default())
            .with_namespace("blog");
        assert_eq!(
            paths.descriptor_file(),
            PathBuf::from("/srv/packages/blog/_build/config.json")
        );
        assert_eq!(paths.core_path(), "/srv/packages/blog/core/components/blog/");
        assert_eq!(
            paths.model_path(),
            "/srv/packages/blog/core/components/blog/model/"
        );
        assert_eq!(
            paths.resource_map_file(),
            PathBuf::from("/srv/packages/blog/assets/components/blog/resourcemap.json")
        );
    }

    #[test]
    fn test_record_from_entity() {
        let entity = Entity::new(EntityKind::Package)
            .with("name", "Blog")
            .with("dir_name", "blog")
            .with("version", "1.0.0");
        let record = PackageRecord::from_entity(&entity);
        assert_eq!(record.name, "Blog");
        assert_eq!(record.dir_name, "blog");
        assert!(record.config.is_empty());
        assert!(record.updated_on.is_none());
    }
}
