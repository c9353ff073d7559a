use pkgsync_core::Dependency;
use pkgsync_storage::{Criteria, EntityKind, ObjectStore};

use crate::error::{ReconcileError, Result};

/// Checks that every dependency is installed, either as a package managed
/// from a source folder or as a regular transport package.
///
/// Version constraints are recorded on [`Dependency`] but not enforced.
///
/// # Errors
///
/// Returns [`ReconcileError::MissingDependencies`] listing every missing name.
pub async fn check_dependencies(store: &dyn ObjectStore, dependencies: &[Dependency]) -> Result<()> {
    let mut missing = Vec::new();
    for dependency in dependencies {
        if !is_installed(store, &dependency.name).await? {
            missing.push(dependency.name.clone());
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::MissingDependencies { missing })
    }
}

async fn is_installed(store: &dyn ObjectStore, name: &str) -> Result<bool> {
    let managed = store
        .get(EntityKind::Package, &Criteria::new().eq("name", name))
        .await?;
    if managed.is_some() {
        return Ok(true);
    }
    let transport = store
        .get(
            EntityKind::TransportPackage,
            &Criteria::new().eq("package_name", name),
        )
        .await?;
    Ok(transport.is_some())
}
