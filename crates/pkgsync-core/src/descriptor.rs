//! Package descriptor model.
//!
//! A [`PackageDescriptor`] is built fresh for every reconciliation run from the
//! JSON document shipped with a package version, used for the duration of the
//! run and dropped. The installed version is re-parsed from the serialized form
//! kept on the package record, with the same parser, so that both sides of a
//! diff are structurally comparable.
//!
//! # Example
//!
//! ```json
//! {
//!   "name": "Blog",
//!   "lowCaseName": "blog",
//!   "version": "1.2.0",
//!   "package": {
//!     "elements": {
//!       "categories": [{ "name": "Widgets" }, { "name": "Sidebar", "parent": "Widgets" }],
//!       "snippets": [{ "name": "GetPosts", "category": "Sidebar" }]
//!     },
//!     "systemSettings": [{ "key": "per_page", "value": 10, "area": "default" }]
//!   },
//!   "database": { "tables": ["BlogPost"], "prefix": "blog_" }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::element::{Element, ElementExtra, ElementKind, TypedFieldSpec, WidgetSpec, WidgetType};
use crate::error::{DescriptorError, Result};
use crate::raw::{
    RawCategory, RawDatabase, RawDependency, RawDescriptor, RawElement, RawMenu, RawResource,
    RawSetting, RawTypedField, RawWidget,
};

/// Typed snapshot of one package version.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub name: String,
    /// Namespace key. Must never change across versions of the same package.
    pub lower_case_name: String,
    pub version: String,
    pub description: String,
    pub author: Option<String>,
    pub database: Option<DatabaseSchema>,
    /// Keyed by the namespaced setting key (`<lowerCaseName>.<key>`).
    pub settings: IndexMap<String, Setting>,
    pub menus: Vec<Menu>,
    pub categories: IndexMap<String, Category>,
    pub elements: BTreeMap<ElementKind, IndexMap<String, Element>>,
    pub resources: Vec<Resource>,
    pub extension_package: Option<ExtensionPackageSpec>,
    pub dependencies: Vec<Dependency>,
}

/// Relational schema owned by the package.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatabaseSchema {
    pub table_prefix: String,
    /// Model classes backed by a table, in declaration order, without duplicates.
    pub tables: Vec<String>,
    /// Model classes without a table of their own.
    pub simple_objects: Vec<String>,
}

impl DatabaseSchema {
    pub fn table_set(&self) -> BTreeSet<&str> {
        self.tables.iter().map(String::as_str).collect()
    }
}

/// A declared system setting.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub key: String,
    /// Default value declared by the package author.
    pub value: String,
    pub area: String,
    /// Editor type of the setting.
    pub xtype: String,
}

/// A declared manager menu entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Menu {
    pub text: String,
    pub parent: String,
    pub description: String,
    pub icon: String,
    pub menu_index: i64,
    pub params: String,
    pub handler: String,
    pub permissions: String,
    pub action: String,
    pub namespace: String,
}

/// A declared category.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    /// Ancestor names, top-most first. Empty means "directly under the package root".
    pub parent_chain: Vec<String>,
}

impl Category {
    /// Name of the immediate parent category, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent_chain.last().map(String::as_str)
    }
}

/// Where a resource hangs in the content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// Tree root (parent id 0).
    Root,
    /// Explicit live id.
    Id(u64),
    /// Page title of a resource declared earlier in the same descriptor.
    Title(String),
}

/// A typed-field value to write on a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
}

/// A declared content-tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Natural key within a run.
    pub page_title: String,
    pub parent: ParentRef,
    pub field_values: Vec<FieldValue>,
    /// Remaining fields, passed through to the resource service untouched.
    pub fields: Map<String, Value>,
}

/// Extension package registration options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionPackageSpec {
    pub options: Map<String, Value>,
}

/// A package this one depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    /// Version constraint as declared; recorded, not enforced.
    pub version: Option<String>,
}

impl PackageDescriptor {
    /// Parses and structurally validates a descriptor document.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidJson`] if the bytes are not a JSON
    /// document of the expected shape, and [`DescriptorError::Invalid`] listing
    /// every structural problem otherwise.
    pub fn from_slice(json: &[u8]) -> Result<Self> {
        let raw: RawDescriptor = serde_json::from_slice(json)?;
        Self::from_raw(raw)
    }

    /// Same as [`PackageDescriptor::from_slice`] for string input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_slice(json.as_bytes())
    }

    fn from_raw(raw: RawDescriptor) -> Result<Self> {
        let mut problems = Vec::new();

        let name = required(raw.name, "name", &mut problems);
        let lower_case_name = required(raw.low_case_name, "lowCaseName", &mut problems);
        let version = required(raw.version, "version", &mut problems);

        let database = raw.database.map(parse_database);
        let extension_package = parse_extension_package(raw.extension_package, &mut problems);
        let dependencies = raw.dependencies.into_iter().map(parse_dependency).collect();

        let settings = parse_settings(
            raw.package.system_settings,
            &lower_case_name,
            &mut problems,
        );
        let menus = parse_menus(raw.package.menus, &lower_case_name, &mut problems);
        let elements_raw = raw.package.elements;
        let categories = parse_categories(elements_raw.categories, &mut problems);

        let mut elements = BTreeMap::new();
        elements.insert(
            ElementKind::Fragment,
            parse_elements(ElementKind::Fragment, elements_raw.chunks, &mut problems),
        );
        elements.insert(
            ElementKind::CodeFragment,
            parse_elements(ElementKind::CodeFragment, elements_raw.snippets, &mut problems),
        );
        elements.insert(
            ElementKind::Template,
            parse_elements(ElementKind::Template, elements_raw.templates, &mut problems),
        );
        elements.insert(
            ElementKind::Hook,
            parse_elements(ElementKind::Hook, elements_raw.plugins, &mut problems),
        );
        elements.insert(
            ElementKind::TypedField,
            parse_typed_fields(elements_raw.tvs, &mut problems),
        );
        elements.insert(
            ElementKind::Widget,
            parse_widgets(elements_raw.widgets, &mut problems),
        );

        let resources = parse_resources(raw.package.resources, &mut problems);

        if !problems.is_empty() {
            return Err(DescriptorError::invalid(problems));
        }

        Ok(Self {
            name,
            lower_case_name,
            version,
            description: raw.description.unwrap_or_default(),
            author: raw.author,
            database,
            settings,
            menus,
            categories,
            elements,
            resources,
            extension_package,
            dependencies,
        })
    }

    /// Elements of one kind, keyed by natural key, in declaration order.
    pub fn elements_of(&self, kind: ElementKind) -> Option<&IndexMap<String, Element>> {
        self.elements.get(&kind)
    }

    /// Natural keys of the declared elements of one kind.
    pub fn element_names(&self, kind: ElementKind) -> BTreeSet<&str> {
        self.elements_of(kind)
            .map(|items| items.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn required(value: Option<String>, field: &str, problems: &mut Vec<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            problems.push(format!("{field} is required"));
            String::new()
        }
    }
}

/// Renders a declared scalar the way the host stores setting values.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn parse_database(raw: RawDatabase) -> DatabaseSchema {
    let mut seen = HashSet::new();
    let tables = raw
        .tables
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();
    DatabaseSchema {
        table_prefix: raw.prefix,
        tables,
        simple_objects: raw.simple_objects,
    }
}

fn parse_extension_package(
    value: Value,
    problems: &mut Vec<String>,
) -> Option<ExtensionPackageSpec> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(ExtensionPackageSpec::default()),
        Value::Object(options) => Some(ExtensionPackageSpec { options }),
        other => {
            problems.push(format!(
                "extensionPackage must be a boolean or an object, got {other}"
            ));
            None
        }
    }
}

fn parse_dependency(raw: RawDependency) -> Dependency {
    match raw {
        RawDependency::Name(name) => Dependency {
            name,
            version: None,
        },
        RawDependency::Spec { name, version } => Dependency { name, version },
    }
}

fn parse_settings(
    raw: Vec<RawSetting>,
    namespace: &str,
    problems: &mut Vec<String>,
) -> IndexMap<String, Setting> {
    let mut settings = IndexMap::new();
    for (i, setting) in raw.into_iter().enumerate() {
        let Some(key) = setting.key.filter(|k| !k.is_empty()) else {
            problems.push(format!("systemSettings[{i}]: key is required"));
            continue;
        };
        let key = format!("{namespace}.{key}");
        if settings.contains_key(&key) {
            problems.push(format!("duplicate system setting key: {key}"));
            continue;
        }
        settings.insert(
            key.clone(),
            Setting {
                key,
                value: scalar_to_string(&setting.value),
                area: setting.area,
                xtype: setting.xtype.unwrap_or_else(|| "textfield".to_string()),
            },
        );
    }
    settings
}

fn parse_menus(raw: Vec<RawMenu>, namespace: &str, problems: &mut Vec<String>) -> Vec<Menu> {
    let mut seen = HashSet::new();
    let mut menus = Vec::new();
    for (i, menu) in raw.into_iter().enumerate() {
        let Some(text) = menu.text.filter(|t| !t.is_empty()) else {
            problems.push(format!("menus[{i}]: text is required"));
            continue;
        };
        if !seen.insert(text.clone()) {
            problems.push(format!("duplicate menu text: {text}"));
            continue;
        }
        let action = match &menu.action {
            Value::Object(obj) => obj
                .get("controller")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| menu.action.to_string()),
            other => scalar_to_string(other),
        };
        menus.push(Menu {
            text,
            parent: menu.parent.unwrap_or_else(|| "components".to_string()),
            description: menu.description,
            icon: menu.icon,
            menu_index: menu.menu_index,
            params: menu.params,
            handler: menu.handler,
            permissions: menu.permissions,
            action,
            namespace: menu.namespace.unwrap_or_else(|| namespace.to_string()),
        });
    }
    menus
}

fn parse_categories(
    raw: Vec<RawCategory>,
    problems: &mut Vec<String>,
) -> IndexMap<String, Category> {
    let mut parents: IndexMap<String, Option<String>> = IndexMap::new();
    for (i, category) in raw.into_iter().enumerate() {
        let Some(name) = category.name.filter(|n| !n.is_empty()) else {
            problems.push(format!("categories[{i}]: name is required"));
            continue;
        };
        if parents.contains_key(&name) {
            problems.push(format!("duplicate category: {name}"));
            continue;
        }
        parents.insert(name, category.parent.filter(|p| !p.is_empty()));
    }

    let mut categories = IndexMap::new();
    for name in parents.keys() {
        match parent_chain(name, &parents) {
            Ok(parent_chain) => {
                categories.insert(
                    name.clone(),
                    Category {
                        name: name.clone(),
                        parent_chain,
                    },
                );
            }
            Err(problem) => problems.push(problem),
        }
    }
    categories
}

/// Walks parent links up to the package root, top-most ancestor first.
fn parent_chain(
    name: &str,
    parents: &IndexMap<String, Option<String>>,
) -> std::result::Result<Vec<String>, String> {
    let mut chain = Vec::new();
    let mut visited: HashSet<&str> = HashSet::from([name]);
    let mut current = parents.get(name).and_then(|p| p.as_deref());

    while let Some(parent) = current {
        if !parents.contains_key(parent) {
            return Err(format!(
                "category {name}: parent category {parent} is not declared"
            ));
        }
        if !visited.insert(parent) {
            return Err(format!("category {name}: parent chain contains a cycle"));
        }
        chain.push(parent.to_string());
        current = parents.get(parent).and_then(|p| p.as_deref());
    }

    chain.reverse();
    Ok(chain)
}

fn base_element(
    kind: ElementKind,
    index: usize,
    raw: RawElement,
    extra: impl FnOnce(&RawElement) -> ElementExtra,
    problems: &mut Vec<String>,
) -> Option<Element> {
    let Some(name) = raw.name.clone().filter(|n| !n.is_empty()) else {
        problems.push(format!("{}[{index}]: name is required", kind.section()));
        return None;
    };
    let extra = extra(&raw);
    let properties = match raw.properties {
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    Some(Element {
        file_path: kind.source_path(&name, raw.file.as_deref()),
        name,
        category: raw.category.filter(|c| !c.is_empty()),
        description: raw.description,
        property_preprocess: raw.property_pre_process,
        properties,
        extra,
    })
}

fn insert_unique(
    kind: ElementKind,
    items: &mut IndexMap<String, Element>,
    element: Element,
    problems: &mut Vec<String>,
) {
    if items.contains_key(&element.name) {
        problems.push(format!("duplicate {} element: {}", kind.section(), element.name));
        return;
    }
    items.insert(element.name.clone(), element);
}

fn parse_elements(
    kind: ElementKind,
    raw: Vec<RawElement>,
    problems: &mut Vec<String>,
) -> IndexMap<String, Element> {
    let mut items = IndexMap::new();
    for (i, element) in raw.into_iter().enumerate() {
        let extra = |raw: &RawElement| match kind {
            ElementKind::Template => ElementExtra::Template {
                icon: raw.icon.clone(),
            },
            ElementKind::Hook => ElementExtra::Hook {
                events: raw.events.clone(),
                disabled: raw.disabled,
            },
            ElementKind::CodeFragment => ElementExtra::CodeFragment,
            _ => ElementExtra::Fragment,
        };
        if let Some(element) = base_element(kind, i, element, extra, problems) {
            insert_unique(kind, &mut items, element, problems);
        }
    }
    items
}

fn parse_typed_fields(
    raw: Vec<RawTypedField>,
    problems: &mut Vec<String>,
) -> IndexMap<String, Element> {
    let kind = ElementKind::TypedField;
    let mut items = IndexMap::new();
    for (i, field) in raw.into_iter().enumerate() {
        let caption = field
            .caption
            .clone()
            .or_else(|| field.common.name.clone())
            .unwrap_or_default();
        let spec = TypedFieldSpec {
            caption,
            input_type: field.input_type.unwrap_or_else(|| "text".to_string()),
            input_option_values: field.input_option_values,
            sort_order: field.sort_order,
            default_value: field.default,
            display: field.display.unwrap_or_else(|| "default".to_string()),
            input_properties: field.input_properties,
            output_properties: field.output_properties,
            templates: field.templates,
        };
        let extra = move |_: &RawElement| ElementExtra::TypedField(spec);
        if let Some(element) = base_element(kind, i, field.common, extra, problems) {
            insert_unique(kind, &mut items, element, problems);
        }
    }
    items
}

fn parse_widgets(raw: Vec<RawWidget>, problems: &mut Vec<String>) -> IndexMap<String, Element> {
    let kind = ElementKind::Widget;
    let mut items = IndexMap::new();
    for (i, widget) in raw.into_iter().enumerate() {
        let spec = WidgetSpec {
            widget_type: WidgetType::parse(widget.widget_type.as_deref().unwrap_or("file")),
            content: widget.content,
            lexicon: widget.lexicon,
            size: widget.size.unwrap_or_else(|| "half".to_string()),
        };
        let extra = move |_: &RawElement| ElementExtra::Widget(spec);
        if let Some(element) = base_element(kind, i, widget.common, extra, problems) {
            insert_unique(kind, &mut items, element, problems);
        }
    }
    items
}

fn parse_resources(raw: Vec<RawResource>, problems: &mut Vec<String>) -> Vec<Resource> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut resources = Vec::new();
    for (i, resource) in raw.into_iter().enumerate() {
        let Some(page_title) = resource.pagetitle.filter(|t| !t.is_empty()) else {
            problems.push(format!("resources[{i}]: pagetitle is required"));
            continue;
        };
        if seen.insert(page_title.clone(), i).is_some() {
            problems.push(format!("duplicate resource pagetitle: {page_title}"));
            continue;
        }
        let parent = match resource.parent {
            Value::Null => ParentRef::Root,
            Value::Number(n) => match n.as_u64() {
                Some(0) => ParentRef::Root,
                Some(id) => ParentRef::Id(id),
                None => {
                    problems.push(format!("resource {page_title}: invalid parent {n}"));
                    continue;
                }
            },
            Value::String(s) if s.is_empty() => ParentRef::Root,
            Value::String(s) => match s.parse::<u64>() {
                Ok(0) => ParentRef::Root,
                Ok(id) => ParentRef::Id(id),
                // Resources are written in declared order, so a title parent
                // must already exist when its child is reached.
                Err(_) if seen.get(&s).is_some_and(|&at| at < i) => ParentRef::Title(s),
                Err(_) => {
                    problems.push(format!(
                        "resource {page_title}: parent {s} is not declared before it"
                    ));
                    continue;
                }
            },
            other => {
                problems.push(format!("resource {page_title}: invalid parent {other}"));
                continue;
            }
        };
        resources.push(Resource {
            page_title,
            parent,
            field_values: resource
                .tvs
                .into_iter()
                .map(|tv| FieldValue {
                    name: tv.name,
                    value: tv.value,
                })
                .collect(),
            fields: resource.fields,
        });
    }
    resources
}
