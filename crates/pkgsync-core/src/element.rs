//! Element kinds and their descriptor representation.

use std::fmt;

use serde_json::{Map, Value};

/// The element kinds a package can declare.
///
/// The order of [`ElementKind::ALL`] is the order in which elements are
/// reconciled: templates come before typed fields, which associate with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    /// Plain content fragment (`chunks`).
    Fragment,
    /// Fragment backed by executable code (`snippets`).
    CodeFragment,
    /// Page template (`templates`).
    Template,
    /// Behavior hook bound to host events (`plugins`).
    Hook,
    /// Typed field attached to templates (`tvs`).
    TypedField,
    /// Dashboard widget (`widgets`).
    Widget,
}

impl ElementKind {
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Fragment,
        ElementKind::CodeFragment,
        ElementKind::Template,
        ElementKind::Hook,
        ElementKind::TypedField,
        ElementKind::Widget,
    ];

    /// Name of the descriptor section (`package.elements.<section>`).
    pub fn section(&self) -> &'static str {
        match self {
            ElementKind::Fragment => "chunks",
            ElementKind::CodeFragment => "snippets",
            ElementKind::Template => "templates",
            ElementKind::Hook => "plugins",
            ElementKind::TypedField => "tvs",
            ElementKind::Widget => "widgets",
        }
    }

    /// Suffix of the default source file name, for kinds backed by a file.
    pub fn default_suffix(&self) -> Option<&'static str> {
        match self {
            ElementKind::Fragment => Some("chunk.tpl"),
            ElementKind::CodeFragment => Some("snippet.php"),
            ElementKind::Template => Some("template.tpl"),
            ElementKind::Hook => Some("plugin.php"),
            ElementKind::Widget => Some("widget.php"),
            ElementKind::TypedField => None,
        }
    }

    /// Path of the element source relative to the package core folder.
    ///
    /// `file` overrides the default `<lowercase name>.<suffix>` file name.
    pub fn source_path(&self, name: &str, file: Option<&str>) -> String {
        match (file, self.default_suffix()) {
            (Some(file), _) => format!("elements/{}/{}", self.section(), file),
            (None, Some(suffix)) => format!(
                "elements/{}/{}.{}",
                self.section(),
                name.to_lowercase(),
                suffix
            ),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// One declared element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Natural key within its kind.
    pub name: String,
    /// Declared category name, if any.
    pub category: Option<String>,
    /// Source path relative to the package core folder (empty for kinds without a file).
    pub file_path: String,
    pub description: String,
    pub property_preprocess: bool,
    /// Default property set, kept as declared.
    pub properties: Value,
    pub extra: ElementExtra,
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        self.extra.kind()
    }
}

/// Kind-specific element data.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementExtra {
    Fragment,
    CodeFragment,
    Template { icon: String },
    Hook { events: Vec<String>, disabled: bool },
    TypedField(TypedFieldSpec),
    Widget(WidgetSpec),
}

impl ElementExtra {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementExtra::Fragment => ElementKind::Fragment,
            ElementExtra::CodeFragment => ElementKind::CodeFragment,
            ElementExtra::Template { .. } => ElementKind::Template,
            ElementExtra::Hook { .. } => ElementKind::Hook,
            ElementExtra::TypedField(_) => ElementKind::TypedField,
            ElementExtra::Widget(_) => ElementKind::Widget,
        }
    }
}

/// Typed-field specific data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedFieldSpec {
    pub caption: String,
    pub input_type: String,
    pub input_option_values: String,
    pub sort_order: i64,
    pub default_value: String,
    pub display: String,
    /// Empty means "leave unspecified", never "clear".
    pub input_properties: Map<String, Value>,
    /// Empty means "leave unspecified", never "clear".
    pub output_properties: Map<String, Value>,
    /// Names of the templates this field is attached to.
    pub templates: Vec<String>,
}

/// Where a widget takes its content from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetType {
    /// Content is a file inside the package core folder.
    File,
    /// Any other host widget type; content is stored inline.
    Inline(String),
}

impl WidgetType {
    pub fn parse(value: &str) -> Self {
        if value == "file" {
            WidgetType::File
        } else {
            WidgetType::Inline(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WidgetType::File => "file",
            WidgetType::Inline(other) => other,
        }
    }
}

/// Widget specific data.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetSpec {
    pub widget_type: WidgetType,
    /// Inline content for non-file widgets.
    pub content: String,
    pub lexicon: String,
    pub size: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_path_defaults() {
        assert_eq!(
            ElementKind::CodeFragment.source_path("GetPosts", None),
            "elements/snippets/getposts.snippet.php"
        );
        assert_eq!(
            ElementKind::Template.source_path("Base", Some("base.html")),
            "elements/templates/base.html"
        );
        assert_eq!(ElementKind::TypedField.source_path("hero", None), "");
    }

    #[test]
    fn test_templates_reconcile_before_typed_fields() {
        let templates = ElementKind::ALL
            .iter()
            .position(|k| *k == ElementKind::Template)
            .unwrap();
        let fields = ElementKind::ALL
            .iter()
            .position(|k| *k == ElementKind::TypedField)
            .unwrap();
        assert!(templates < fields);
    }

    #[test]
    fn test_widget_type_parse() {
        assert_eq!(WidgetType::parse("file"), WidgetType::File);
        assert_eq!(
            WidgetType::parse("snippet"),
            WidgetType::Inline("snippet".to_string())
        );
        assert_eq!(WidgetType::parse("html").as_str(), "html");
    }
}
