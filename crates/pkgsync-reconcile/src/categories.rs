//! Package category tree.
//!
//! Every package owns a root category named after the package. Declared
//! categories hang below it, nested according to their parent chain.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use pkgsync_core::Category;
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, StorageError};
use tracing::{debug, info, instrument};

use crate::report::PhaseReport;

/// Upper bound on parent links followed when checking subtree membership.
const MAX_DEPTH: usize = 64;

/// Category name to live id, as resolved during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    root_id: u64,
    ids: HashMap<String, u64>,
}

impl CategoryMap {
    pub fn new(root_id: u64) -> Self {
        Self {
            root_id,
            ids: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> u64 {
        self.root_id
    }

    pub fn insert(&mut self, name: impl Into<String>, id: u64) {
        self.ids.insert(name.into(), id);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.ids.get(name).copied()
    }

    /// Id for an element's declared category, falling back to the root.
    pub fn resolve(&self, name: Option<&str>) -> u64 {
        name.and_then(|n| self.get(n)).unwrap_or(self.root_id)
    }
}

/// Finds or creates the package root category.
pub async fn ensure_root(store: &dyn ObjectStore, package_name: &str) -> Result<u64, StorageError> {
    let (entity, _) = find_or_create(store, package_name, 0).await?;
    Ok(entity.id_or_zero())
}

/// Finds or creates every declared category under the root and maps names to ids.
#[instrument(skip_all, fields(root = root_id, count = categories.len()))]
pub async fn sync_categories(
    store: &dyn ObjectStore,
    root_id: u64,
    categories: &IndexMap<String, Category>,
    report: &mut PhaseReport,
) -> CategoryMap {
    let mut map = CategoryMap::new(root_id);

    for (name, category) in categories {
        match resolve_category(store, root_id, category, &mut map).await {
            Ok((id, was_new)) => {
                map.insert(name.as_str(), id);
                report.upserted(name.as_str(), was_new);
            }
            Err(e) => report.failed(name.as_str(), e),
        }
    }

    info!(
        created = report.created.len(),
        updated = report.updated.len(),
        failed = report.failed.len(),
        "categories reconciled"
    );
    map
}

/// Walks the parent chain from the root, placing missing ancestors, then
/// places the category itself under its resolved parent.
async fn resolve_category(
    store: &dyn ObjectStore,
    root_id: u64,
    category: &Category,
    map: &mut CategoryMap,
) -> Result<(u64, bool), StorageError> {
    let mut parent_id = root_id;
    for ancestor in &category.parent_chain {
        parent_id = match map.get(ancestor) {
            Some(id) => id,
            None => {
                let (entity, _) = place(store, root_id, ancestor, parent_id).await?;
                entity.id_or_zero()
            }
        };
    }
    let (entity, was_new) = place(store, root_id, &category.name, parent_id).await?;
    Ok((entity.id_or_zero(), was_new))
}

/// Finds `name` under `parent_id`. Failing that, a category of that name
/// elsewhere in the package subtree is moved under `parent_id` and keeps its
/// id. Only when neither exists is a new category created.
async fn place(
    store: &dyn ObjectStore,
    root_id: u64,
    name: &str,
    parent_id: u64,
) -> Result<(Entity, bool), StorageError> {
    let exact = Criteria::new().eq("category", name).eq("parent", parent_id);
    if let Some(existing) = store.get(EntityKind::Category, &exact).await? {
        return Ok((existing, false));
    }

    let candidates = store
        .find_all(EntityKind::Category, &Criteria::new().eq("category", name))
        .await?;
    for mut candidate in candidates {
        let id = candidate.id_or_zero();
        if id == root_id || !in_subtree(store, &candidate, root_id).await? {
            continue;
        }
        // Moving a category below itself would close a cycle.
        if descends_from(store, parent_id, id).await? {
            continue;
        }
        let from = candidate.get_u64("parent").unwrap_or(0);
        candidate.set("parent", parent_id);
        store.save(&mut candidate).await?;
        debug!(name, id, from, to = parent_id, "category moved");
        return Ok((candidate, false));
    }

    Ok((create_category(store, name, parent_id).await?, true))
}

async fn find_or_create(
    store: &dyn ObjectStore,
    name: &str,
    parent_id: u64,
) -> Result<(Entity, bool), StorageError> {
    let criteria = Criteria::new().eq("category", name).eq("parent", parent_id);
    if let Some(existing) = store.get(EntityKind::Category, &criteria).await? {
        return Ok((existing, false));
    }
    Ok((create_category(store, name, parent_id).await?, true))
}

async fn create_category(store: &dyn ObjectStore, name: &str, parent_id: u64) -> Result<Entity, StorageError> {
    let mut entity = store
        .create(EntityKind::Category)
        .with("category", name)
        .with("parent", parent_id);
    store.save(&mut entity).await?;
    debug!(name, parent_id, "category created");
    Ok(entity)
}

/// Removes categories declared only by the old version.
///
/// Only categories inside the package root subtree are touched; categories of
/// the same name elsewhere belong to somebody else. Membership is decided for
/// every candidate before anything is removed so that removing a parent
/// cannot hide its children.
#[instrument(skip_all, fields(root = root_id))]
pub async fn remove_unused_categories(
    store: &dyn ObjectStore,
    root_id: u64,
    old: &IndexMap<String, Category>,
    new: &IndexMap<String, Category>,
) -> PhaseReport {
    let mut report = PhaseReport::default();
    let mut doomed: Vec<(String, Entity)> = Vec::new();

    for name in old.keys().filter(|name| !new.contains_key(*name)) {
        let candidates = match store
            .find_all(EntityKind::Category, &Criteria::new().eq("category", name.as_str()))
            .await
        {
            Ok(found) => found,
            Err(e) => {
                report.failed(name.as_str(), e);
                continue;
            }
        };
        for candidate in candidates {
            match in_subtree(store, &candidate, root_id).await {
                Ok(true) => doomed.push((name.clone(), candidate)),
                Ok(false) => report.skipped(name.as_str()),
                Err(e) => report.failed(name.as_str(), e),
            }
        }
    }

    // Children that stay must not point at a removed parent.
    let doomed_ids: HashSet<u64> = doomed.iter().map(|(_, e)| e.id_or_zero()).collect();
    for (name, entity) in &doomed {
        let adopted =
            adopt_children(store, entity.id_or_zero(), root_id, &doomed_ids, &mut report).await;
        if let Err(e) = adopted {
            report.failed(name.as_str(), e);
        }
    }

    for (name, entity) in doomed {
        match store.remove(&entity).await {
            Ok(()) => report.deleted(name),
            Err(e) => report.failed(name, e),
        }
    }

    info!(
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        "unused categories removed"
    );
    report
}

/// Moves the surviving children of `parent_id` to the package root.
async fn adopt_children(
    store: &dyn ObjectStore,
    parent_id: u64,
    root_id: u64,
    doomed: &HashSet<u64>,
    report: &mut PhaseReport,
) -> Result<(), StorageError> {
    let children = store
        .find_all(EntityKind::Category, &Criteria::new().eq("parent", parent_id))
        .await?;
    for mut child in children {
        if doomed.contains(&child.id_or_zero()) {
            continue;
        }
        child.set("parent", root_id);
        store.save(&mut child).await?;
        let name = child.get_str("category").unwrap_or_default().to_string();
        debug!(name = %name, parent_id, "category reattached to package root");
        report.updated(name);
    }
    Ok(())
}

async fn in_subtree(
    store: &dyn ObjectStore,
    category: &Entity,
    root_id: u64,
) -> Result<bool, StorageError> {
    descends_from(store, category.get_u64("parent").unwrap_or(0), root_id).await
}

/// Whether following parent links from `start` (inclusive) reaches `ancestor`.
async fn descends_from(
    store: &dyn ObjectStore,
    start: u64,
    ancestor: u64,
) -> Result<bool, StorageError> {
    let mut seen = HashSet::new();
    let mut parent = start;
    while parent != 0 && seen.len() < MAX_DEPTH {
        if parent == ancestor {
            return Ok(true);
        }
        if !seen.insert(parent) {
            break;
        }
        parent = match store
            .get(EntityKind::Category, &Criteria::by_id(parent))
            .await?
        {
            Some(entity) => entity.get_u64("parent").unwrap_or(0),
            None => 0,
        };
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgsync_db_memory::InMemoryStore;

    fn declared(items: &[(&str, &[&str])]) -> IndexMap<String, Category> {
        items
            .iter()
            .map(|(name, chain)| {
                (
                    name.to_string(),
                    Category {
                        name: name.to_string(),
                        parent_chain: chain.iter().map(|c| c.to_string()).collect(),
                    },
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_nested_categories_resolve_under_root() {
        let store = InMemoryStore::new();
        let root = ensure_root(&store, "Blog").await.unwrap();
        let categories = declared(&[("Widgets", &[]), ("Recent", &["Widgets", "Sidebar"])]);

        let mut report = PhaseReport::default();
        let map = sync_categories(&store, root, &categories, &mut report).await;

        let widgets = map.get("Widgets").unwrap();
        let recent = store
            .fetch(EntityKind::Category, map.get("Recent").unwrap())
            .unwrap();
        let sidebar = store
            .fetch(EntityKind::Category, recent.get_u64("parent").unwrap())
            .unwrap();
        assert_eq!(sidebar.get_str("category"), Some("Sidebar"));
        assert_eq!(sidebar.get_u64("parent"), Some(widgets));
        assert_eq!(map.resolve(Some("Unknown")), root);
        assert_eq!(map.resolve(None), root);

        // Second run finds everything.
        let mut again = PhaseReport::default();
        let second = sync_categories(&store, root, &categories, &mut again).await;
        assert_eq!(second, map);
        assert!(again.created.is_empty());
        assert_eq!(ensure_root(&store, "Blog").await.unwrap(), root);
    }

    #[tokio::test]
    async fn test_reparented_category_keeps_identity() {
        let store = InMemoryStore::new();
        let root = ensure_root(&store, "Blog").await.unwrap();
        let v1 = declared(&[("Widgets", &[]), ("Sidebar", &["Widgets"])]);
        let first = sync_categories(&store, root, &v1, &mut PhaseReport::default()).await;

        let v2 = declared(&[("Sidebar", &[])]);
        let mut report = PhaseReport::default();
        let second = sync_categories(&store, root, &v2, &mut report).await;
        assert_eq!(second.get("Sidebar"), first.get("Sidebar"));
        assert_eq!(report.updated, vec!["Sidebar"]);
        assert!(report.created.is_empty());

        let removed = remove_unused_categories(&store, root, &v1, &v2).await;
        assert_eq!(removed.deleted, vec!["Widgets"]);
        let sidebar = store
            .fetch(EntityKind::Category, second.get("Sidebar").unwrap())
            .unwrap();
        assert_eq!(sidebar.get_u64("parent"), Some(root));
        assert_eq!(store.count(EntityKind::Category), 2);
    }

    #[tokio::test]
    async fn test_swapped_nesting_does_not_cycle() {
        let store = InMemoryStore::new();
        let root = ensure_root(&store, "Blog").await.unwrap();
        let v1 = declared(&[("A", &[]), ("B", &["A"])]);
        let first = sync_categories(&store, root, &v1, &mut PhaseReport::default()).await;

        let v2 = declared(&[("A", &["B"]), ("B", &[])]);
        let second = sync_categories(&store, root, &v2, &mut PhaseReport::default()).await;
        assert_eq!(second, first);

        let a = store.fetch(EntityKind::Category, second.get("A").unwrap()).unwrap();
        let b = store.fetch(EntityKind::Category, second.get("B").unwrap()).unwrap();
        assert_eq!(b.get_u64("parent"), Some(root));
        assert_eq!(a.get_u64("parent"), b.id);
    }

    #[tokio::test]
    async fn test_children_of_removed_category_move_to_root() {
        let store = InMemoryStore::new();
        let root = ensure_root(&store, "Blog").await.unwrap();
        let v1 = declared(&[("Widgets", &[])]);
        let map = sync_categories(&store, root, &v1, &mut PhaseReport::default()).await;

        // A category the user added below a package category.
        let mut custom = store
            .create(EntityKind::Category)
            .with("category", "Mine")
            .with("parent", map.get("Widgets").unwrap());
        store.save(&mut custom).await.unwrap();

        let report = remove_unused_categories(&store, root, &v1, &IndexMap::new()).await;
        assert_eq!(report.deleted, vec!["Widgets"]);
        assert_eq!(report.updated, vec!["Mine"]);
        let custom = store.fetch(EntityKind::Category, custom.id_or_zero()).unwrap();
        assert_eq!(custom.get_u64("parent"), Some(root));
    }

    #[tokio::test]
    async fn test_removal_limited_to_package_subtree() {
        let store = InMemoryStore::new();
        let root = ensure_root(&store, "Blog").await.unwrap();
        let old = declared(&[("Shared", &[]), ("Child", &["Shared"]), ("Kept", &[])]);
        let mut report = PhaseReport::default();
        sync_categories(&store, root, &old, &mut report).await;

        // A foreign category with the same name outside the package tree.
        let mut foreign = store
            .create(EntityKind::Category)
            .with("category", "Shared")
            .with("parent", 0);
        store.save(&mut foreign).await.unwrap();

        let new = declared(&[("Kept", &[])]);
        let report = remove_unused_categories(&store, root, &old, &new).await;

        assert_eq!(report.deleted, vec!["Shared", "Child"]);
        assert_eq!(report.skipped, vec!["Shared"]);
        assert!(store.fetch(EntityKind::Category, foreign.id_or_zero()).is_some());
        let names: Vec<_> = store
            .all(EntityKind::Category)
            .iter()
            .filter_map(|c| c.get_str("category").map(str::to_string))
            .collect();
        assert_eq!(names, vec!["Blog", "Kept", "Shared"]);
    }
}
