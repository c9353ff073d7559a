//! Shared fixture for the reconciliation tests: an in-memory backend, a
//! package folder in a temp dir and a package record pointing at it.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use pkgsync_config::SyncConfig;
use pkgsync_db_memory::{InMemoryBackend, TableShape};
use pkgsync_reconcile::{
    Collaborators, PackageRecord, PackageUpdater, ReconcileReport, Result, UpdateOptions,
};
use pkgsync_storage::EntityKind;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

pub const DIR_NAME: &str = "blog";

/// Kinds compared by [`Fixture::snapshot`].
pub const SNAPSHOT_KINDS: [EntityKind; 14] = [
    EntityKind::Package,
    EntityKind::Category,
    EntityKind::Fragment,
    EntityKind::CodeFragment,
    EntityKind::Template,
    EntityKind::Hook,
    EntityKind::HookEvent,
    EntityKind::TypedField,
    EntityKind::TypedFieldTemplate,
    EntityKind::TypedFieldValue,
    EntityKind::Widget,
    EntityKind::Menu,
    EntityKind::Setting,
    EntityKind::Resource,
];

pub fn collaborators(backend: &InMemoryBackend) -> Collaborators {
    Collaborators {
        store: backend.store.clone(),
        introspector: backend.schema.clone(),
        schema: backend.schema.clone(),
        models: backend.schema.clone(),
        extensions: backend.extensions.clone(),
        resources: backend.resources.clone(),
        cache: backend.cache.clone(),
    }
}

pub fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct Fixture {
    pub backend: InMemoryBackend,
    pub packages_dir: TempDir,
    pub config: SyncConfig,
    pub package_id: u64,
}

impl Fixture {
    /// Seeds a package record whose installed descriptor is `installed`.
    pub async fn new(installed: &str) -> Self {
        let backend = InMemoryBackend::new();
        let packages_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(packages_dir.path().join(DIR_NAME).join("_build")).unwrap();

        for (table, columns) in [
            ("BlogPost", vec!["id", "title", "body"]),
            ("BlogComment", vec!["id", "post", "text"]),
            ("BlogTag", vec!["id", "tag"]),
        ] {
            backend
                .schema
                .declare_model(table, TableShape::new(columns, ["PRIMARY"]))
                .await;
        }

        let installed_value: Value = serde_json::from_str(installed).unwrap();
        let record = backend.store.insert(
            EntityKind::Package,
            fields(json!({
                "name": installed_value["name"],
                "dir_name": DIR_NAME,
                "version": installed_value["version"],
                "config": installed,
            })),
        );

        let mut config = SyncConfig::default();
        config.packages.packages_dir = Some(packages_dir.path().to_path_buf());

        Self {
            backend,
            packages_dir,
            config,
            package_id: record.id_or_zero(),
        }
    }

    pub fn package_root(&self) -> PathBuf {
        self.packages_dir.path().join(DIR_NAME)
    }

    pub fn resource_map_path(&self) -> PathBuf {
        self.package_root()
            .join("assets/components/blog/resourcemap.json")
    }

    /// Puts `descriptor` into the package folder as the incoming version.
    pub fn write_descriptor(&self, descriptor: &str) {
        std::fs::write(self.package_root().join("_build/config.json"), descriptor).unwrap();
    }

    pub fn updater(&self) -> PackageUpdater {
        PackageUpdater::new(collaborators(&self.backend), self.config.clone())
    }

    pub async fn update(&self, options: UpdateOptions) -> Result<ReconcileReport> {
        self.updater().update(self.package_id, &options).await
    }

    pub async fn record(&self) -> PackageRecord {
        PackageRecord::load(self.backend.store.as_ref(), self.package_id)
            .await
            .unwrap()
    }

    /// Field values of every live entity, per kind, ignoring ids and the
    /// record timestamp.
    pub fn snapshot(&self) -> BTreeMap<&'static str, Vec<String>> {
        SNAPSHOT_KINDS
            .iter()
            .map(|kind| {
                let mut rows: Vec<String> = self
                    .backend
                    .store
                    .all(*kind)
                    .into_iter()
                    .map(|entity| {
                        let mut fields = entity.fields;
                        fields.remove("updatedon");
                        Value::Object(fields).to_string()
                    })
                    .collect();
                rows.sort();
                (kind.as_str(), rows)
            })
            .collect()
    }
}

/// Descriptor of the blog package. `version` and the element lists vary per test.
pub fn blog_descriptor(version: &str, chunks: &[&str]) -> String {
    let chunks: Vec<Value> = chunks.iter().map(|name| json!({ "name": name })).collect();
    json!({
        "name": "Blog",
        "lowCaseName": "blog",
        "version": version,
        "description": format!("Blog {version}"),
        "package": {
            "menus": [{ "text": "blog.menu", "description": "blog.menu_desc", "action": "home" }],
            "elements": {
                "categories": [{ "name": "Widgets" }, { "name": "Sidebar", "parent": "Widgets" }],
                "chunks": chunks,
                "snippets": [{ "name": "GetPosts", "category": "Sidebar" }],
                "templates": [{ "name": "BlogPost" }],
                "plugins": [{ "name": "BlogRouter", "events": ["OnPageNotFound", "OnHandleRequest"] }],
                "tvs": [{ "name": "hero", "caption": "Hero", "type": "image", "templates": ["BlogPost"] }],
                "widgets": [{ "name": "blog.stats", "type": "html", "content": "<b>stats</b>" }]
            },
            "systemSettings": [{ "key": "per_page", "value": 10 }],
            "resources": [
                { "pagetitle": "Blog", "tvs": [{ "name": "hero", "value": "a.png" }] },
                { "pagetitle": "Archive", "parent": "Blog" }
            ]
        },
        "database": { "tables": ["BlogPost", "BlogComment"], "prefix": "blog_", "simpleObjects": ["BlogBase"] },
        "extensionPackage": { "serviceName": "blog" }
    })
    .to_string()
}

/// Smallest valid descriptor of the blog package.
pub fn bare_descriptor(version: &str) -> String {
    json!({ "name": "Blog", "lowCaseName": "blog", "version": version }).to_string()
}

/// Replaces the value at JSON `pointer` in `descriptor`.
pub fn patch(descriptor: &str, pointer: &str, value: Value) -> String {
    let mut doc: Value = serde_json::from_str(descriptor).unwrap();
    *doc.pointer_mut(pointer).unwrap() = value;
    doc.to_string()
}
