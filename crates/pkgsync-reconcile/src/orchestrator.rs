//! Runs a package update from validation to the final record write.
//!
//! Validation is the only step that can abort. Once it has passed, every
//! phase runs in a fixed order, records its per-item outcome in the
//! [`ReconcileReport`] and leaves failed items for the next run to converge.

use std::io::ErrorKind;
use std::path::Path;

use pkgsync_config::SyncConfig;
use pkgsync_core::PackageDescriptor;
use pkgsync_storage::CachePartition;
use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, error, info, info_span, instrument, warn};

use crate::categories::{ensure_root, remove_unused_categories, sync_categories};
use crate::context::Collaborators;
use crate::dependencies::check_dependencies;
use crate::elements::{ElementContext, Materialization, sync_elements};
use crate::error::{ReconcileError, Result};
use crate::extension::sync_extension_package;
use crate::menus::sync_menus;
use crate::package::{PackagePaths, PackageRecord};
use crate::report::{PhaseReport, ReconcileReport};
use crate::resource_map::FileResourceMapStore;
use crate::resources::sync_resources;
use crate::schema::{SchemaOptions, sync_schema};
use crate::settings::sync_settings;

/// Steps of an update, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Validate,
    SyncSchema,
    SyncMenus,
    SyncExtensionPackage,
    SyncSettings,
    SyncCategories,
    SyncElements,
    SyncResources,
    InvalidateCache,
    Done,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::SyncSchema => "sync_schema",
            Self::SyncMenus => "sync_menus",
            Self::SyncExtensionPackage => "sync_extension_package",
            Self::SyncSettings => "sync_settings",
            Self::SyncCategories => "sync_categories",
            Self::SyncElements => "sync_elements",
            Self::SyncResources => "sync_resources",
            Self::InvalidateCache => "invalidate_cache",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-chosen flags for one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Drop every old table and create every new one.
    pub recreate_database: bool,
    /// Bring columns and indexes of tables kept between versions up to date.
    pub alter_database: bool,
}

impl From<&UpdateOptions> for SchemaOptions {
    fn from(options: &UpdateOptions) -> Self {
        SchemaOptions {
            recreate: options.recreate_database,
            alter: options.alter_database,
        }
    }
}

const INVALIDATED_PARTITIONS: [CachePartition; 3] = [
    CachePartition::Menu,
    CachePartition::Settings,
    CachePartition::Resource,
];

/// Everything the mutation phases need, produced by validation.
#[derive(Debug)]
struct ValidatedUpdate {
    record: PackageRecord,
    paths: PackagePaths,
    installed: PackageDescriptor,
    incoming: PackageDescriptor,
    /// Incoming descriptor in its stored form.
    config: String,
}

/// Updates installed packages from their source folders.
#[derive(Debug, Clone)]
pub struct PackageUpdater {
    cx: Collaborators,
    config: SyncConfig,
}

impl PackageUpdater {
    pub fn new(cx: Collaborators, config: SyncConfig) -> Self {
        Self { cx, config }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.cx
    }

    /// Brings the live store in line with the package folder of `package_id`.
    ///
    /// Returns an error only when validation rejects the update, in which
    /// case nothing has been written. Otherwise the report lists what every
    /// phase did, including the items that failed.
    #[instrument(skip(self), fields(backend = self.cx.store.backend_name()))]
    pub async fn update(
        &self,
        package_id: u64,
        options: &UpdateOptions,
    ) -> Result<ReconcileReport> {
        let update = self
            .validate(package_id)
            .instrument(info_span!("phase", name = %SyncPhase::Validate))
            .await
            .inspect_err(|e| warn!(package_id, error = %e, "update rejected"))?;

        let incoming = &update.incoming;
        let installed = &update.installed;
        let namespace = incoming.lower_case_name.as_str();
        let model_path = update.paths.model_path();
        let mut report = ReconcileReport::new(namespace, incoming.version.as_str());
        info!(
            package = %namespace,
            from = %installed.version,
            to = %incoming.version,
            "updating package"
        );

        let phase = sync_schema(
            &self.cx,
            namespace,
            &model_path,
            installed.database.as_ref(),
            incoming.database.as_ref(),
            SchemaOptions::from(options),
        )
        .instrument(info_span!("phase", name = %SyncPhase::SyncSchema))
        .await;
        report.record(SyncPhase::SyncSchema, phase);

        let phase = sync_menus(self.cx.store.as_ref(), &installed.menus, &incoming.menus)
            .instrument(info_span!("phase", name = %SyncPhase::SyncMenus))
            .await;
        report.record(SyncPhase::SyncMenus, phase);

        let phase = sync_extension_package(
            self.cx.extensions.as_ref(),
            namespace,
            &model_path,
            installed.extension_package.as_ref(),
            incoming.extension_package.as_ref(),
            incoming.database.as_ref(),
        )
        .instrument(info_span!("phase", name = %SyncPhase::SyncExtensionPackage))
        .await;
        report.record(SyncPhase::SyncExtensionPackage, phase);

        let phase = sync_settings(
            self.cx.store.as_ref(),
            namespace,
            &installed.settings,
            &incoming.settings,
        )
        .instrument(info_span!("phase", name = %SyncPhase::SyncSettings))
        .await;
        report.record(SyncPhase::SyncSettings, phase);

        self.sync_tree(&update, &mut report).await;

        let phase = sync_resources(
            self.cx.store.as_ref(),
            self.cx.resources.as_ref(),
            &FileResourceMapStore::new(update.paths.resource_map_file()),
            &incoming.resources,
            self.config.site.site_start,
        )
        .instrument(info_span!("phase", name = %SyncPhase::SyncResources))
        .await;
        report.record(SyncPhase::SyncResources, phase);

        // A stale cache does not undo the update.
        if let Err(e) = self.cx.cache.invalidate(&INVALIDATED_PARTITIONS).await {
            error!(package = %namespace, error = %e, "cache invalidation failed");
        }
        report.record(SyncPhase::InvalidateCache, PhaseReport::default());

        let mut done = PhaseReport::default();
        match PackageRecord::store_update(
            self.cx.store.as_ref(),
            update.record.id,
            incoming,
            &update.config,
        )
        .await
        {
            Ok(()) => done.updated(update.record.name.as_str()),
            Err(e) => done.failed(update.record.name.as_str(), e),
        }
        report.record(SyncPhase::Done, done);

        info!(
            package = %namespace,
            version = %incoming.version,
            failures = report.failures().count(),
            "package updated"
        );
        Ok(report)
    }

    /// Categories, then the elements referencing them, then removal of the
    /// categories the new version no longer declares.
    async fn sync_tree(&self, update: &ValidatedUpdate, report: &mut ReconcileReport) {
        let store = self.cx.store.as_ref();
        let incoming = &update.incoming;

        let span = info_span!("phase", name = %SyncPhase::SyncCategories);
        let mut categories = PhaseReport::default();
        let root_id = match ensure_root(store, &incoming.name).instrument(span.clone()).await {
            Ok(id) => Some(id),
            Err(e) => {
                categories.failed(incoming.name.as_str(), e);
                None
            }
        };
        let map = sync_categories(
            store,
            root_id.unwrap_or_default(),
            &incoming.categories,
            &mut categories,
        )
        .instrument(span)
        .await;
        report.record(SyncPhase::SyncCategories, categories);

        let core_path = update.paths.core_path();
        let ctx = ElementContext {
            namespace: incoming.lower_case_name.as_str(),
            core_path: &core_path,
            mode: Materialization::from_debug_flag(self.config.debug.enable_debug),
            categories: &map,
        };
        let span = info_span!("phase", name = %SyncPhase::SyncElements);
        let mut elements = sync_elements(store, &ctx, &update.installed, incoming)
            .instrument(span.clone())
            .await;
        // Without the root there is no subtree to bound the removal.
        if let Some(root_id) = root_id {
            let removed = remove_unused_categories(
                store,
                root_id,
                &update.installed.categories,
                &incoming.categories,
            )
            .instrument(span)
            .await;
            elements.merge(removed);
        }
        report.record(SyncPhase::SyncElements, elements);
    }

    /// Checks that the update may run. Reads only.
    async fn validate(&self, package_id: u64) -> Result<ValidatedUpdate> {
        let packages_dir = self
            .config
            .packages
            .packages_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or(ReconcileError::PackagesDirNotConfigured)?;

        let record = PackageRecord::load(self.cx.store.as_ref(), package_id).await?;
        let paths = PackagePaths::new(packages_dir, &record.dir_name, &self.config.packages);

        let bytes = read_descriptor(&paths.descriptor_file())?;
        let incoming = PackageDescriptor::from_slice(&bytes).map_err(ReconcileError::from_incoming)?;
        let installed = PackageDescriptor::from_json_str(&record.config)
            .map_err(ReconcileError::from_installed)?;

        if installed.name != incoming.name {
            return Err(ReconcileError::NameChanged {
                installed: installed.name,
                incoming: incoming.name,
            });
        }
        if installed.lower_case_name != incoming.lower_case_name {
            return Err(ReconcileError::LowerCaseNameChanged {
                installed: installed.lower_case_name,
                incoming: incoming.lower_case_name,
            });
        }

        check_dependencies(self.cx.store.as_ref(), &incoming.dependencies).await?;

        // The record keeps the descriptor compacted.
        let config = serde_json::from_slice::<Value>(&bytes)
            .map_err(|e| ReconcileError::InvalidJson {
                message: e.to_string(),
            })?
            .to_string();

        let paths = paths.with_namespace(&incoming.lower_case_name);
        Ok(ValidatedUpdate {
            record,
            paths,
            installed,
            incoming,
            config,
        })
    }
}

fn read_descriptor(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ReconcileError::DescriptorNotFound {
            path: path.to_path_buf(),
        },
        _ => ReconcileError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}
