//! Resource reconciliation.
//!
//! Resources have no stable natural key in the live store (titles can be
//! edited), so the package keeps its own identity map from page title to id.
//! The map is the source of truth for "which resources does this package
//! own": entries missing from the new version are removed, except for the
//! site start page.

use std::collections::BTreeSet;

use pkgsync_core::{ParentRef, Resource};
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, ResourceService, StorageError};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::report::PhaseReport;
use crate::resource_map::{ResourceMap, ResourceMapStore};

/// Reconciles package resources and persists the updated identity map.
#[instrument(skip_all, fields(count = resources.len(), site_start))]
pub async fn sync_resources(
    store: &dyn ObjectStore,
    service: &dyn ResourceService,
    map_store: &dyn ResourceMapStore,
    resources: &[Resource],
    site_start: u64,
) -> PhaseReport {
    let mut report = PhaseReport::default();

    // Without the map every owned resource would be duplicated.
    let mut map = match map_store.load() {
        Ok(map) => map,
        Err(e) => {
            report.failed("resource map", e);
            return report;
        }
    };

    let declared: BTreeSet<&str> = resources.iter().map(|r| r.page_title.as_str()).collect();
    let to_remove: Vec<(String, u64)> = map
        .iter()
        .filter(|(title, _)| !declared.contains(title.as_str()))
        .map(|(title, id)| (title.clone(), *id))
        .collect();

    for resource in resources {
        let title = resource.page_title.as_str();
        match write_resource(store, service, resource, &map).await {
            Ok((entity, was_new)) => {
                let id = entity.id_or_zero();
                let stored_title = entity.get_str("pagetitle").unwrap_or(title).to_string();
                map.insert(stored_title, id);
                report.upserted(title, was_new);
                for field in &resource.field_values {
                    if let Err(e) = service.set_field_value(id, &field.name, &field.value).await {
                        report.failed(format!("{title}/{}", field.name), e);
                    }
                }
            }
            Err(e) => report.failed(title, e),
        }
    }

    for (title, id) in to_remove {
        map.remove(&title);
        if id == site_start {
            debug!(title = %title, id, "site start resource kept");
            report.skipped(title);
            continue;
        }
        match remove_resource(store, id).await {
            Ok(true) => report.deleted(title),
            Ok(false) => {}
            Err(e) => report.failed(title, e),
        }
    }

    if let Err(e) = map_store.save(&map) {
        report.failed("resource map", e);
    }

    info!(
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "resources reconciled"
    );
    report
}

/// Resolves a declared parent to a live id; unknown titles fall back to the root.
fn resolve_parent(parent: &ParentRef, map: &ResourceMap) -> u64 {
    match parent {
        ParentRef::Root => 0,
        ParentRef::Id(id) => *id,
        ParentRef::Title(title) => map.get(title).copied().unwrap_or_else(|| {
            debug!(parent = %title, "parent not in resource map, using root");
            0
        }),
    }
}

async fn write_resource(
    store: &dyn ObjectStore,
    service: &dyn ResourceService,
    resource: &Resource,
    map: &ResourceMap,
) -> Result<(Entity, bool), StorageError> {
    let mut payload: Map<String, Value> = resource.fields.clone();
    payload.insert(
        "pagetitle".to_string(),
        Value::String(resource.page_title.clone()),
    );
    payload.insert(
        "parent".to_string(),
        Value::from(resolve_parent(&resource.parent, map)),
    );

    let live_id = match map.get(&resource.page_title) {
        Some(id) => store
            .get(EntityKind::Resource, &Criteria::by_id(*id))
            .await?
            .map(|entity| entity.id_or_zero()),
        None => None,
    };

    match live_id {
        Some(id) => Ok((service.update_resource(id, &payload).await?, false)),
        None => Ok((service.create_resource(&payload).await?, true)),
    }
}

/// Reparents children to the tree root, then removes the resource.
async fn remove_resource(store: &dyn ObjectStore, id: u64) -> Result<bool, StorageError> {
    let Some(entity) = store
        .get(EntityKind::Resource, &Criteria::by_id(id))
        .await?
    else {
        return Ok(false);
    };
    let mut to_root = Map::new();
    to_root.insert("parent".to_string(), Value::from(0));
    store
        .update_where(EntityKind::Resource, &Criteria::new().eq("parent", id), &to_root)
        .await?;
    store.remove(&entity).await?;
    Ok(true)
}
