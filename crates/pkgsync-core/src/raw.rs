//! Serde shapes of the descriptor document, before validation.
//!
//! Everything optional here is optional on purpose: missing required fields
//! are reported by [`crate::PackageDescriptor::from_slice`] together with all
//! other problems instead of failing deserialization on the first one.

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDescriptor {
    pub name: Option<String>,
    pub low_case_name: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub package: RawPackage,
    pub database: Option<RawDatabase>,
    #[serde(default)]
    pub extension_package: Value,
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPackage {
    #[serde(default)]
    pub menus: Vec<RawMenu>,
    #[serde(default)]
    pub elements: RawElements,
    #[serde(default)]
    pub system_settings: Vec<RawSetting>,
    #[serde(default)]
    pub resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDatabase {
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub simple_objects: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawDependency {
    Name(String),
    Spec {
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMenu {
    pub text: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: Value,
    pub parent: Option<String>,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub menu_index: i64,
    #[serde(default)]
    pub params: String,
    #[serde(default)]
    pub handler: String,
    #[serde(default)]
    pub permissions: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSetting {
    pub key: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub area: String,
    #[serde(rename = "type")]
    pub xtype: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct RawElements {
    #[serde(default)]
    pub categories: Vec<RawCategory>,
    #[serde(default)]
    pub chunks: Vec<RawElement>,
    #[serde(default)]
    pub snippets: Vec<RawElement>,
    #[serde(default)]
    pub templates: Vec<RawElement>,
    #[serde(default)]
    pub plugins: Vec<RawElement>,
    #[serde(default)]
    pub tvs: Vec<RawTypedField>,
    #[serde(default)]
    pub widgets: Vec<RawWidget>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCategory {
    pub name: Option<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawElement {
    pub name: Option<String>,
    pub category: Option<String>,
    pub file: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub property_pre_process: bool,
    #[serde(default)]
    pub properties: Value,
    // templates
    #[serde(default)]
    pub icon: String,
    // plugins
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTypedField {
    #[serde(flatten)]
    pub common: RawElement,
    pub caption: Option<String>,
    #[serde(rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub input_option_values: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default, alias = "defaultValue")]
    pub default: String,
    pub display: Option<String>,
    #[serde(default)]
    pub input_properties: Map<String, Value>,
    #[serde(default)]
    pub output_properties: Map<String, Value>,
    #[serde(default)]
    pub templates: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawWidget {
    #[serde(flatten)]
    pub common: RawElement,
    #[serde(rename = "type")]
    pub widget_type: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub lexicon: String,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawResource {
    pub pagetitle: Option<String>,
    #[serde(default)]
    pub parent: Value,
    #[serde(default)]
    pub tvs: Vec<RawFieldValue>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFieldValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}
