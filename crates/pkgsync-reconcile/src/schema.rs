//! Relational schema evolution between two package versions.

use std::collections::BTreeSet;

use pkgsync_core::DatabaseSchema;
use pkgsync_storage::{ModelRegistry, PRIMARY_INDEX, SchemaIntrospector, SchemaManager};
use tracing::{debug, info, instrument};

use crate::context::Collaborators;
use crate::report::PhaseReport;

/// Flags controlling how shared tables are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Drop every old table and create every new one.
    pub recreate: bool,
    /// Bring columns and indexes of tables present in both versions in line
    /// with the declared model.
    pub alter: bool,
}

/// Reconciles package tables.
///
/// Items in the report are table names, or `table.column` / `table.index`
/// for column and index changes.
#[instrument(skip_all, fields(package = %namespace))]
pub async fn sync_schema(
    cx: &Collaborators,
    namespace: &str,
    model_path: &str,
    old: Option<&DatabaseSchema>,
    new: Option<&DatabaseSchema>,
    options: SchemaOptions,
) -> PhaseReport {
    let mut report = PhaseReport::default();
    if old.is_none() && new.is_none() {
        return report;
    }

    // Model classes must be known before any DDL on their tables.
    for schema in [old, new].into_iter().flatten() {
        register_model(cx.models.as_ref(), namespace, model_path, schema, &mut report).await;
    }

    let old_tables = old.map(DatabaseSchema::table_set).unwrap_or_default();
    let new_tables = new.map(DatabaseSchema::table_set).unwrap_or_default();

    if options.recreate {
        for table in old.map(|s| s.tables.as_slice()).unwrap_or_default() {
            drop_table(cx.schema.as_ref(), table, &mut report).await;
        }
        for table in new.map(|s| s.tables.as_slice()).unwrap_or_default() {
            create_table(cx.schema.as_ref(), table, &mut report).await;
        }
    } else {
        for table in old_tables.difference(&new_tables) {
            drop_table(cx.schema.as_ref(), table, &mut report).await;
        }
        // Creation is a no-op for live tables, so shared tables missing live
        // are restored as well.
        for table in new.map(|s| s.tables.as_slice()).unwrap_or_default() {
            create_table(cx.schema.as_ref(), table, &mut report).await;
        }
        if options.alter {
            for table in old_tables.intersection(&new_tables) {
                alter_table(cx, table, &mut report).await;
            }
        }
    }

    info!(
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "schema reconciled"
    );
    report
}

async fn register_model(
    models: &dyn ModelRegistry,
    namespace: &str,
    model_path: &str,
    schema: &DatabaseSchema,
    report: &mut PhaseReport,
) {
    if let Err(e) = models
        .register_package(namespace, model_path, &schema.table_prefix)
        .await
    {
        report.failed(namespace, e);
    }
    for class in &schema.simple_objects {
        if let Err(e) = models.load_class(class).await {
            report.failed(class.as_str(), e);
        }
    }
}

async fn drop_table(schema: &dyn SchemaManager, table: &str, report: &mut PhaseReport) {
    match schema.drop_table(table).await {
        Ok(()) => report.deleted(table),
        Err(e) => report.failed(table, e),
    }
}

async fn create_table(schema: &dyn SchemaManager, table: &str, report: &mut PhaseReport) {
    match schema.create_table(table).await {
        Ok(()) => debug!(table, "table ensured"),
        Err(e) => report.failed(table, e),
    }
}

/// Column sync followed by a full rebuild of non-primary indexes.
async fn alter_table(cx: &Collaborators, table: &str, report: &mut PhaseReport) {
    sync_columns(cx, table, report).await;
    rebuild_indexes(cx, table, report).await;
}

async fn sync_columns(cx: &Collaborators, table: &str, report: &mut PhaseReport) {
    let live = match cx.introspector.list_columns(table).await {
        Ok(columns) => columns,
        Err(e) => return report.failed(table, e),
    };
    let declared = match cx.models.field_meta(table).await {
        Ok(columns) => columns,
        Err(e) => return report.failed(table, e),
    };

    let mut unused: BTreeSet<&str> = live.iter().map(String::as_str).collect();
    for column in &declared {
        let item = format!("{table}.{column}");
        if unused.remove(column.as_str()) {
            match cx.schema.alter_column(table, column).await {
                Ok(()) => report.updated(item),
                Err(e) => report.failed(item, e),
            }
        } else {
            match cx.schema.add_column(table, column).await {
                Ok(()) => report.created(item),
                Err(e) => report.failed(item, e),
            }
        }
    }
    for column in unused {
        let item = format!("{table}.{column}");
        match cx.schema.drop_column(table, column).await {
            Ok(()) => report.deleted(item),
            Err(e) => report.failed(item, e),
        }
    }
}

async fn rebuild_indexes(cx: &Collaborators, table: &str, report: &mut PhaseReport) {
    let introspector: &dyn SchemaIntrospector = cx.introspector.as_ref();
    let live = match introspector.list_indexes(table).await {
        Ok(indexes) => indexes,
        Err(e) => return report.failed(table, e),
    };
    for index in live.iter().filter(|i| i.as_str() != PRIMARY_INDEX) {
        let item = format!("{table}.{index}");
        match cx.schema.drop_index(table, index).await {
            Ok(()) => report.deleted(item),
            Err(e) => report.failed(item, e),
        }
    }

    let declared = match cx.models.index_meta(table).await {
        Ok(indexes) => indexes,
        Err(e) => return report.failed(table, e),
    };
    for index in declared.iter().filter(|i| i.as_str() != PRIMARY_INDEX) {
        let item = format!("{table}.{index}");
        match cx.schema.add_index(table, index).await {
            Ok(()) => report.created(item),
            Err(e) => report.failed(item, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::collaborators;
    use pkgsync_db_memory::{InMemoryBackend, SchemaOp, TableShape};

    fn schema(tables: &[&str]) -> DatabaseSchema {
        DatabaseSchema {
            table_prefix: "blog_".into(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            simple_objects: vec!["BlogBase".into()],
        }
    }

    async fn backend_with_models(models: &[&str]) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        for model in models {
            backend
                .schema
                .declare_model(model, TableShape::new(["id", "name"], ["PRIMARY", "name"]))
                .await;
        }
        backend
    }

    #[tokio::test]
    async fn test_no_schema_is_noop() {
        let backend = InMemoryBackend::new();
        let cx = collaborators(&backend);
        let report = sync_schema(&cx, "blog", "/m/", None, None, SchemaOptions::default()).await;
        assert_eq!(report, PhaseReport::default());
        assert!(backend.schema.registered_packages().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_dropped_added_created() {
        let backend = backend_with_models(&["Post", "Tag", "Comment"]).await;
        backend.schema.seed_table("Post", TableShape::new(["id"], ["PRIMARY"])).await;
        backend.schema.seed_table("Tag", TableShape::new(["id"], ["PRIMARY"])).await;
        let cx = collaborators(&backend);

        let old = schema(&["Post", "Tag"]);
        let new = schema(&["Post", "Comment"]);
        let report =
            sync_schema(&cx, "blog", "/m/", Some(&old), Some(&new), SchemaOptions::default()).await;

        assert!(!report.has_failures());
        assert_eq!(
            backend.schema.journal().await,
            vec![
                SchemaOp::DropTable("Tag".into()),
                SchemaOp::CreateTable("Comment".into()),
            ]
        );
        // Registered once per present schema, simple objects loaded each time.
        assert_eq!(backend.schema.registered_packages().await.len(), 2);
        assert_eq!(backend.schema.loaded_classes().await, vec!["BlogBase", "BlogBase"]);
    }

    #[tokio::test]
    async fn test_alter_syncs_columns_and_rebuilds_indexes() {
        let backend = backend_with_models(&["Post"]).await;
        backend
            .schema
            .seed_table("Post", TableShape::new(["id", "legacy"], ["PRIMARY", "legacy_idx"]))
            .await;
        let cx = collaborators(&backend);

        let both = schema(&["Post"]);
        let options = SchemaOptions {
            recreate: false,
            alter: true,
        };
        let report = sync_schema(&cx, "blog", "/m/", Some(&both), Some(&both), options).await;
        assert!(!report.has_failures());

        let live = backend.schema.table("Post").await.unwrap();
        assert_eq!(live.columns, vec!["id", "name"]);
        assert_eq!(live.indexes, vec!["PRIMARY", "name"]);
        assert_eq!(
            backend.schema.journal().await,
            vec![
                SchemaOp::AlterColumn("Post".into(), "id".into()),
                SchemaOp::AddColumn("Post".into(), "name".into()),
                SchemaOp::DropColumn("Post".into(), "legacy".into()),
                SchemaOp::DropIndex("Post".into(), "legacy_idx".into()),
                SchemaOp::AddIndex("Post".into(), "name".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_recreate_drops_all_old_then_creates_all_new() {
        let backend = backend_with_models(&["Post", "Tag"]).await;
        backend.schema.seed_table("Post", TableShape::new(["id"], ["PRIMARY"])).await;
        let cx = collaborators(&backend);

        let old = schema(&["Post"]);
        let new = schema(&["Post", "Tag"]);
        let options = SchemaOptions {
            recreate: true,
            alter: true,
        };
        sync_schema(&cx, "blog", "/m/", Some(&old), Some(&new), options).await;

        assert_eq!(
            backend.schema.journal().await,
            vec![
                SchemaOp::DropTable("Post".into()),
                SchemaOp::CreateTable("Post".into()),
                SchemaOp::CreateTable("Tag".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_other_tables() {
        let backend = backend_with_models(&["Post"]).await;
        let cx = collaborators(&backend);

        let new = schema(&["Ghost", "Post"]);
        let report = sync_schema(&cx, "blog", "/m/", None, Some(&new), SchemaOptions::default()).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].item, "Ghost");
        assert!(backend.schema.table("Post").await.is_some());
    }
}
