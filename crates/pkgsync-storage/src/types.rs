//! Value types shared by the collaborator contracts.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds of entities held by the live object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Record of a package managed from a source folder.
    Package,
    /// Package installed through the regular transport channel.
    TransportPackage,
    Category,
    /// Plain content fragment.
    Fragment,
    /// Content fragment backed by executable code.
    CodeFragment,
    Template,
    /// Behavior hook reacting to host events.
    Hook,
    /// Binding of a hook to a single event.
    HookEvent,
    /// Typed field attachable to resources.
    TypedField,
    /// Association between a typed field and a template.
    TypedFieldTemplate,
    /// Value of a typed field on a resource.
    TypedFieldValue,
    Widget,
    Menu,
    Setting,
    /// Content-tree node.
    Resource,
}

impl EntityKind {
    /// Stable lowercase name, used in logs and error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::TransportPackage => "transport_package",
            Self::Category => "category",
            Self::Fragment => "fragment",
            Self::CodeFragment => "code_fragment",
            Self::Template => "template",
            Self::Hook => "hook",
            Self::HookEvent => "hook_event",
            Self::TypedField => "typed_field",
            Self::TypedFieldTemplate => "typed_field_template",
            Self::TypedFieldValue => "typed_field_value",
            Self::Widget => "widget",
            Self::Menu => "menu",
            Self::Setting => "setting",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live-store entity: a kind, an optional numeric id and a bag of fields.
///
/// The id is `None` until the entity has been saved for the first time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub id: Option<u64>,
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Creates a new, unsaved entity of the given kind.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            id: None,
            fields: Map::new(),
        }
    }

    /// Returns `true` if the entity has never been saved.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Returns the id, or 0 for unsaved entities.
    #[must_use]
    pub fn id_or_zero(&self) -> u64 {
        self.id.unwrap_or(0)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a string field, if present and a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Returns an unsigned integer field, if present and numeric.
    #[must_use]
    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.fields.get(field).and_then(Value::as_u64)
    }

    /// Returns a boolean field, if present and boolean.
    #[must_use]
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style variant of [`Entity::set`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }
}

/// A single condition inside [`Criteria`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value. The pseudo-field `id` matches the entity id.
    Eq(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
}

/// Conjunction of field conditions used to look entities up.
///
/// # Example
///
/// ```
/// use pkgsync_storage::{Criteria, Entity, EntityKind};
///
/// let criteria = Criteria::new().eq("name", "News").eq("parent", 4u64);
/// let entity = Entity::new(EntityKind::Category)
///     .with("name", "News")
///     .with("parent", 4u64);
/// assert!(criteria.matches(&entity));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    conditions: Vec<Condition>,
}

impl Criteria {
    /// Criteria matching every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria matching a single id.
    #[must_use]
    pub fn by_id(id: u64) -> Self {
        Self::new().eq("id", id)
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    /// Adds a membership condition.
    #[must_use]
    pub fn is_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluates the criteria against an entity.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq(field, expected) => field_value(entity, field).as_ref() == Some(expected),
            Condition::In(field, candidates) => field_value(entity, field)
                .map(|actual| candidates.contains(&actual))
                .unwrap_or(false),
        })
    }
}

fn field_value(entity: &Entity, field: &str) -> Option<Value> {
    if field == "id" {
        entity.id.map(Value::from)
    } else {
        entity.fields.get(field).cloned()
    }
}

/// Cache partitions the host can be told to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePartition {
    /// Manager menu structure.
    Menu,
    /// Resource tree and content cache.
    Resource,
    /// System settings cache.
    Settings,
}

impl fmt::Display for CachePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Menu => write!(f, "menu"),
            Self::Resource => write!(f, "resource"),
            Self::Settings => write!(f, "settings"),
        }
    }
}
