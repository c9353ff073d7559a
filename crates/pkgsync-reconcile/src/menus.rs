use pkgsync_core::Menu;
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, StorageError};
use tracing::{info, instrument};

use crate::report::PhaseReport;

/// Replaces the menus of the old version with the menus of the new one.
///
/// Every old menu is deleted by text, then every new menu is written. A menu
/// already present under a new text (left over from an interrupted run) is
/// reused instead of duplicated.
#[instrument(skip_all, fields(old = old.len(), new = new.len()))]
pub async fn sync_menus(store: &dyn ObjectStore, old: &[Menu], new: &[Menu]) -> PhaseReport {
    let mut report = PhaseReport::default();

    for menu in old {
        match remove_menu(store, &menu.text).await {
            Ok(true) => report.deleted(menu.text.as_str()),
            Ok(false) => {}
            Err(e) => report.failed(menu.text.as_str(), e),
        }
    }

    for menu in new {
        match write_menu(store, menu).await {
            Ok(()) => report.created(menu.text.as_str()),
            Err(e) => report.failed(menu.text.as_str(), e),
        }
    }

    info!(
        created = report.created.len(),
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "menus reconciled"
    );
    report
}

async fn remove_menu(store: &dyn ObjectStore, text: &str) -> Result<bool, StorageError> {
    match store
        .get(EntityKind::Menu, &Criteria::new().eq("text", text))
        .await?
    {
        Some(entity) => {
            store.remove(&entity).await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn write_menu(store: &dyn ObjectStore, menu: &Menu) -> Result<(), StorageError> {
    let mut entity = store
        .get(EntityKind::Menu, &Criteria::new().eq("text", menu.text.as_str()))
        .await?
        .unwrap_or_else(|| store.create(EntityKind::Menu));
    apply_menu(&mut entity, menu);
    store.save(&mut entity).await
}

fn apply_menu(entity: &mut Entity, menu: &Menu) {
    entity.set("text", menu.text.as_str());
    entity.set("parent", menu.parent.as_str());
    entity.set("description", menu.description.as_str());
    entity.set("icon", menu.icon.as_str());
    entity.set("menuindex", menu.menu_index);
    entity.set("params", menu.params.as_str());
    entity.set("handler", menu.handler.as_str());
    entity.set("permissions", menu.permissions.as_str());
    entity.set("action", menu.action.as_str());
    entity.set("namespace", menu.namespace.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgsync_db_memory::InMemoryStore;

    fn menu(text: &str, action: &str) -> Menu {
        Menu {
            text: text.into(),
            parent: "components".into(),
            description: String::new(),
            icon: String::new(),
            menu_index: 0,
            params: String::new(),
            handler: String::new(),
            permissions: String::new(),
            action: action.into(),
            namespace: "blog".into(),
        }
    }

    #[tokio::test]
    async fn test_old_menus_replaced() {
        let store = InMemoryStore::new();
        let old = vec![menu("blog.menu", "home"), menu("blog.gone", "x")];
        sync_menus(&store, &[], &old).await;
        assert_eq!(store.count(EntityKind::Menu), 2);

        let new = vec![menu("blog.menu", "index")];
        let report = sync_menus(&store, &old, &new).await;

        assert_eq!(report.deleted, vec!["blog.menu", "blog.gone"]);
        assert_eq!(report.created, vec!["blog.menu"]);
        let menus = store.all(EntityKind::Menu);
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].get_str("action"), Some("index"));
        assert_eq!(menus[0].get_str("parent"), Some("components"));
        assert_eq!(menus[0].get_str("namespace"), Some("blog"));
    }

    #[tokio::test]
    async fn test_leftover_menu_is_reused() {
        let store = InMemoryStore::new();
        let new = vec![menu("blog.menu", "home")];
        sync_menus(&store, &[], &new).await;
        // Old version never declared it, yet the menu exists.
        sync_menus(&store, &[], &new).await;
        assert_eq!(store.count(EntityKind::Menu), 1);
    }
}
