//! Element reconciliation.
//!
//! Each [`ElementKind`] maps to one row of a closed dispatch table
//! ([`ElementSpec`]) naming the entity kind it is stored as, the field holding
//! its natural key and the field holding inline code, if any. The diff itself
//! is the same for every kind: upsert every new key, then remove the keys only
//! the old version declared.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use pkgsync_core::{
    Element, ElementExtra, ElementKind, PackageDescriptor, TypedFieldSpec, WidgetSpec, WidgetType,
};
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, StorageError};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::categories::CategoryMap;
use crate::report::PhaseReport;

/// Storage layout of one element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub entity: EntityKind,
    /// Field holding the natural key.
    pub key_field: &'static str,
    /// Field holding inline code when materialized in debug mode.
    pub code_field: Option<&'static str>,
    /// Whether the element is backed by a source file.
    pub file_backed: bool,
}

impl ElementSpec {
    pub const fn of(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Fragment => Self {
                kind,
                entity: EntityKind::Fragment,
                key_field: "name",
                code_field: None,
                file_backed: true,
            },
            ElementKind::CodeFragment => Self {
                kind,
                entity: EntityKind::CodeFragment,
                key_field: "name",
                code_field: Some("snippet"),
                file_backed: true,
            },
            ElementKind::Template => Self {
                kind,
                entity: EntityKind::Template,
                key_field: "template_name",
                code_field: None,
                file_backed: true,
            },
            ElementKind::Hook => Self {
                kind,
                entity: EntityKind::Hook,
                key_field: "name",
                code_field: Some("plugincode"),
                file_backed: true,
            },
            ElementKind::TypedField => Self {
                kind,
                entity: EntityKind::TypedField,
                key_field: "name",
                code_field: None,
                file_backed: false,
            },
            ElementKind::Widget => Self {
                kind,
                entity: EntityKind::Widget,
                key_field: "name",
                code_field: None,
                file_backed: false,
            },
        }
    }

    fn by_key(&self, name: &str) -> Criteria {
        Criteria::new().eq(self.key_field, name)
    }
}

/// How code elements are written into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// Inline code includes the package source directly.
    Debug,
    /// Elements reference their source file through the namespace core path setting.
    Static,
}

impl Materialization {
    pub fn from_debug_flag(enable_debug: bool) -> Self {
        if enable_debug {
            Materialization::Debug
        } else {
            Materialization::Static
        }
    }
}

/// Per-run inputs shared by every element kind.
#[derive(Debug, Clone, Copy)]
pub struct ElementContext<'a> {
    /// Package namespace (lower-case name).
    pub namespace: &'a str,
    /// Absolute package core folder, `/`-terminated.
    pub core_path: &'a str,
    pub mode: Materialization,
    pub categories: &'a CategoryMap,
}

/// Reconciles every element kind, in [`ElementKind::ALL`] order.
#[instrument(skip_all, fields(package = %ctx.namespace))]
pub async fn sync_elements(
    store: &dyn ObjectStore,
    ctx: &ElementContext<'_>,
    old: &PackageDescriptor,
    new: &PackageDescriptor,
) -> PhaseReport {
    let empty = IndexMap::new();
    let mut report = PhaseReport::default();
    for kind in ElementKind::ALL {
        let old_items = old.elements_of(kind).unwrap_or(&empty);
        let new_items = new.elements_of(kind).unwrap_or(&empty);
        report.merge(sync_kind(store, ctx, ElementSpec::of(kind), old_items, new_items).await);
    }
    report
}

async fn sync_kind(
    store: &dyn ObjectStore,
    ctx: &ElementContext<'_>,
    spec: ElementSpec,
    old: &IndexMap<String, Element>,
    new: &IndexMap<String, Element>,
) -> PhaseReport {
    let mut report = PhaseReport::default();
    let item = |name: &str| format!("{}/{}", spec.kind, name);

    for (name, element) in new {
        match upsert_element(store, ctx, spec, element).await {
            Ok(was_new) => report.upserted(item(name), was_new),
            Err(e) => report.failed(item(name), e),
        }
    }

    let old_keys: BTreeSet<&str> = old.keys().map(String::as_str).collect();
    let new_keys: BTreeSet<&str> = new.keys().map(String::as_str).collect();
    for name in old_keys.difference(&new_keys) {
        match remove_element(store, spec, name).await {
            Ok(true) => report.deleted(item(name)),
            Ok(false) => {}
            Err(e) => report.failed(item(name), e),
        }
    }

    info!(
        kind = %spec.kind,
        created = report.created.len(),
        updated = report.updated.len(),
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "elements reconciled"
    );
    report
}

async fn upsert_element(
    store: &dyn ObjectStore,
    ctx: &ElementContext<'_>,
    spec: ElementSpec,
    element: &Element,
) -> Result<bool, StorageError> {
    let (mut entity, was_new) = match store.get(spec.entity, &spec.by_key(&element.name)).await? {
        Some(existing) => (existing, false),
        None => (
            store
                .create(spec.entity)
                .with(spec.key_field, element.name.as_str()),
            true,
        ),
    };

    entity.set("description", element.description.as_str());
    // Dashboard widgets carry neither a category nor property sets.
    if spec.kind != ElementKind::Widget {
        entity.set("property_preprocess", element.property_preprocess);
        entity.set(
            "category",
            ctx.categories.resolve(element.category.as_deref()),
        );
    }
    // Typed fields keep their live property set; only input/output properties are synced.
    if !matches!(spec.kind, ElementKind::Widget | ElementKind::TypedField) {
        entity.set("properties", element.properties.clone());
    }
    if spec.file_backed {
        materialize(&mut entity, ctx, spec, element);
    }

    match &element.extra {
        ElementExtra::Template { icon } => entity.set("icon", icon.as_str()),
        ElementExtra::Hook { disabled, .. } => entity.set("disabled", *disabled),
        ElementExtra::TypedField(field) => apply_typed_field(&mut entity, field),
        ElementExtra::Widget(widget) => apply_widget(&mut entity, ctx, element, widget),
        ElementExtra::Fragment | ElementExtra::CodeFragment => {}
    }

    store.save(&mut entity).await?;
    let id = entity.id_or_zero();

    match &element.extra {
        ElementExtra::Hook { events, .. } => replace_hook_events(store, id, events).await?,
        ElementExtra::TypedField(field) => {
            replace_template_links(store, id, &field.templates).await?
        }
        _ => {}
    }

    debug!(kind = %spec.kind, name = %element.name, id, was_new, "element written");
    Ok(was_new)
}

/// Writes either the debug include or the static file reference.
fn materialize(entity: &mut Entity, ctx: &ElementContext<'_>, spec: ElementSpec, element: &Element) {
    match (ctx.mode, spec.code_field) {
        (Materialization::Debug, Some(code_field)) => {
            let include = format!("include(\"{}{}\");", ctx.core_path, element.file_path);
            let code = if spec.kind == ElementKind::Hook {
                include
            } else {
                format!("return {include}")
            };
            entity.set(code_field, code);
            entity.set("static", false);
            entity.set("static_file", "");
        }
        _ => {
            entity.set("static", true);
            entity.set(
                "static_file",
                format!("[[++{}.core_path]]{}", ctx.namespace, element.file_path),
            );
        }
    }
}

fn apply_typed_field(entity: &mut Entity, field: &TypedFieldSpec) {
    entity.set("caption", field.caption.as_str());
    entity.set("type", field.input_type.as_str());
    entity.set("elements", field.input_option_values.as_str());
    entity.set("rank", field.sort_order);
    entity.set("default_text", field.default_value.as_str());
    entity.set("display", field.display.as_str());
    // Empty property maps mean "not declared" and leave live values alone.
    if !field.input_properties.is_empty() {
        entity.set("input_properties", Value::Object(field.input_properties.clone()));
    }
    if !field.output_properties.is_empty() {
        entity.set("output_properties", Value::Object(field.output_properties.clone()));
    }
}

fn apply_widget(entity: &mut Entity, ctx: &ElementContext<'_>, element: &Element, widget: &WidgetSpec) {
    let content = match widget.widget_type {
        WidgetType::File => format!("{}{}", ctx.core_path, element.file_path),
        WidgetType::Inline(_) => widget.content.clone(),
    };
    entity.set("type", widget.widget_type.as_str());
    entity.set("content", content);
    entity.set("namespace", ctx.namespace);
    entity.set("lexicon", widget.lexicon.as_str());
    entity.set("size", widget.size.as_str());
}

async fn replace_hook_events(
    store: &dyn ObjectStore,
    hook_id: u64,
    events: &[String],
) -> Result<(), StorageError> {
    store
        .remove_where(EntityKind::HookEvent, &Criteria::new().eq("pluginid", hook_id))
        .await?;
    for event in events {
        let mut binding = store
            .create(EntityKind::HookEvent)
            .with("pluginid", hook_id)
            .with("event", event.as_str())
            .with("priority", 0)
            .with("propertyset", 0);
        store.save(&mut binding).await?;
    }
    Ok(())
}

async fn replace_template_links(
    store: &dyn ObjectStore,
    field_id: u64,
    templates: &[String],
) -> Result<(), StorageError> {
    store
        .remove_where(
            EntityKind::TypedFieldTemplate,
            &Criteria::new().eq("tmplvarid", field_id),
        )
        .await?;
    if templates.is_empty() {
        return Ok(());
    }
    let template_key = ElementSpec::of(ElementKind::Template).key_field;
    let found = store
        .find_all(
            EntityKind::Template,
            &Criteria::new().is_in(template_key, templates.iter().map(String::as_str)),
        )
        .await?;
    for template in found {
        let mut link = store
            .create(EntityKind::TypedFieldTemplate)
            .with("tmplvarid", field_id)
            .with("templateid", template.id_or_zero());
        store.save(&mut link).await?;
    }
    Ok(())
}

async fn remove_element(
    store: &dyn ObjectStore,
    spec: ElementSpec,
    name: &str,
) -> Result<bool, StorageError> {
    let Some(entity) = store.get(spec.entity, &spec.by_key(name)).await? else {
        return Ok(false);
    };
    let id = entity.id_or_zero();
    match spec.kind {
        ElementKind::Hook => {
            store
                .remove_where(EntityKind::HookEvent, &Criteria::new().eq("pluginid", id))
                .await?;
        }
        ElementKind::TypedField => {
            store
                .remove_where(
                    EntityKind::TypedFieldTemplate,
                    &Criteria::new().eq("tmplvarid", id),
                )
                .await?;
        }
        _ => {}
    }
    store.remove(&entity).await?;
    Ok(true)
}
