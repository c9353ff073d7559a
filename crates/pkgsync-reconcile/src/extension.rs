use pkgsync_core::{DatabaseSchema, ExtensionPackageSpec};
use pkgsync_storage::ExtensionRegistry;
use serde_json::Value;
use tracing::{info, instrument};

use crate::report::PhaseReport;

/// Re-registers the package model as a host extension package.
///
/// The old registration is dropped when the old version declared one; the
/// new one is added with the descriptor options plus `tablePrefix` when the
/// new version has a database schema.
#[instrument(skip_all, fields(package = %namespace))]
pub async fn sync_extension_package(
    registry: &dyn ExtensionRegistry,
    namespace: &str,
    model_path: &str,
    old: Option<&ExtensionPackageSpec>,
    new: Option<&ExtensionPackageSpec>,
    database: Option<&DatabaseSchema>,
) -> PhaseReport {
    let mut report = PhaseReport::default();

    if old.is_some() {
        match registry.remove_extension_package(namespace).await {
            Ok(()) => report.deleted(namespace),
            Err(e) => report.failed(namespace, e),
        }
    }

    if let Some(spec) = new {
        let mut options = spec.options.clone();
        if let Some(db) = database {
            options.insert(
                "tablePrefix".to_string(),
                Value::String(db.table_prefix.clone()),
            );
        }
        match registry
            .add_extension_package(namespace, model_path, &options)
            .await
        {
            Ok(()) => report.created(namespace),
            Err(e) => report.failed(namespace, e),
        }
    }

    info!(
        registered = !report.created.is_empty(),
        unregistered = !report.deleted.is_empty(),
        "extension package reconciled"
    );
    report
}
