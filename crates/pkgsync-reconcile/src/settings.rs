use indexmap::IndexMap;
use pkgsync_core::Setting;
use pkgsync_storage::{Criteria, EntityKind, ObjectStore, StorageError};
use tracing::{debug, info, instrument};

use crate::report::PhaseReport;

/// Reconciles system settings of the package namespace.
///
/// A setting value is user data once installed: it is only overwritten when
/// the old version did not declare the key or declared a different default.
/// Area and editor type always follow the new version. Keys only declared by
/// the old version are removed.
#[instrument(skip_all, fields(package = %namespace))]
pub async fn sync_settings(
    store: &dyn ObjectStore,
    namespace: &str,
    old: &IndexMap<String, Setting>,
    new: &IndexMap<String, Setting>,
) -> PhaseReport {
    let mut report = PhaseReport::default();

    for (key, setting) in new {
        match upsert_setting(store, namespace, setting, old.get(key)).await {
            Ok(was_new) => report.upserted(key.as_str(), was_new),
            Err(e) => report.failed(key.as_str(), e),
        }
    }

    for key in old.keys().filter(|key| !new.contains_key(*key)) {
        match remove_setting(store, key).await {
            Ok(true) => report.deleted(key.as_str()),
            Ok(false) => {}
            Err(e) => report.failed(key.as_str(), e),
        }
    }

    info!(
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "settings reconciled"
    );
    report
}

async fn upsert_setting(
    store: &dyn ObjectStore,
    namespace: &str,
    setting: &Setting,
    previous: Option<&Setting>,
) -> Result<bool, StorageError> {
    let existing = store
        .get(
            EntityKind::Setting,
            &Criteria::new().eq("key", setting.key.as_str()),
        )
        .await?;

    let (mut entity, was_new) = match existing {
        Some(entity) => {
            let mut entity = entity;
            let default_changed = previous.is_none_or(|p| p.value != setting.value);
            if default_changed {
                entity.set("value", setting.value.as_str());
            } else {
                debug!(key = %setting.key, "keeping installed value");
            }
            (entity, false)
        }
        None => {
            let mut entity = store.create(EntityKind::Setting);
            entity.set("key", setting.key.as_str());
            entity.set("value", setting.value.as_str());
            entity.set("namespace", namespace);
            (entity, true)
        }
    };
    entity.set("area", setting.area.as_str());
    entity.set("xtype", setting.xtype.as_str());
    store.save(&mut entity).await?;
    Ok(was_new)
}

async fn remove_setting(store: &dyn ObjectStore, key: &str) -> Result<bool, StorageError> {
    match store
        .get(EntityKind::Setting, &Criteria::new().eq("key", key))
        .await?
    {
        Some(entity) => {
            store.remove(&entity).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgsync_db_memory::InMemoryStore;

    fn settings(items: &[(&str, &str)]) -> IndexMap<String, Setting> {
        items
            .iter()
            .map(|(key, value)| {
                let key = format!("blog.{key}");
                (
                    key.clone(),
                    Setting {
                        key,
                        value: value.to_string(),
                        area: "default".into(),
                        xtype: "textfield".into(),
                    },
                )
            })
            .collect()
    }

    async fn value_of(store: &InMemoryStore, key: &str) -> Option<String> {
        store
            .get(EntityKind::Setting, &Criteria::new().eq("key", key))
            .await
            .unwrap()
            .and_then(|e| e.get_str("value").map(str::to_string))
    }

    #[tokio::test]
    async fn test_customized_value_survives_unchanged_default() {
        let store = InMemoryStore::new();
        let v1 = settings(&[("per_page", "10")]);
        sync_settings(&store, "blog", &IndexMap::new(), &v1).await;

        let mut live = store
            .get(EntityKind::Setting, &Criteria::new().eq("key", "blog.per_page"))
            .await
            .unwrap()
            .unwrap();
        live.set("value", "25");
        store.save(&mut live).await.unwrap();

        let report = sync_settings(&store, "blog", &v1, &v1).await;
        assert_eq!(report.updated, vec!["blog.per_page"]);
        assert_eq!(value_of(&store, "blog.per_page").await.as_deref(), Some("25"));

        let v2 = settings(&[("per_page", "20")]);
        sync_settings(&store, "blog", &v1, &v2).await;
        assert_eq!(value_of(&store, "blog.per_page").await.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn test_existing_key_unknown_to_old_version_is_overwritten() {
        let store = InMemoryStore::new();
        let v1 = settings(&[("per_page", "10")]);
        sync_settings(&store, "blog", &IndexMap::new(), &v1).await;

        let mut live = store
            .get(EntityKind::Setting, &Criteria::new().eq("key", "blog.per_page"))
            .await
            .unwrap()
            .unwrap();
        live.set("value", "25");
        live.set("area", "custom");
        store.save(&mut live).await.unwrap();

        sync_settings(&store, "blog", &IndexMap::new(), &v1).await;
        let live = store.all(EntityKind::Setting).remove(0);
        assert_eq!(live.get_str("value"), Some("10"));
        assert_eq!(live.get_str("area"), Some("default"));
        assert_eq!(live.get_str("namespace"), Some("blog"));
    }

    #[tokio::test]
    async fn test_old_only_keys_removed() {
        let store = InMemoryStore::new();
        let v1 = settings(&[("a", "1"), ("b", "2")]);
        let v2 = settings(&[("a", "1")]);
        sync_settings(&store, "blog", &IndexMap::new(), &v1).await;

        let report = sync_settings(&store, "blog", &v1, &v2).await;
        assert_eq!(report.deleted, vec!["blog.b"]);
        assert_eq!(store.count(EntityKind::Setting), 1);
    }
}
