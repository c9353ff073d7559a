use std::sync::Arc;

use async_trait::async_trait;
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, ResourceService, StorageError};
use serde_json::{Map, Value};

use crate::store::InMemoryStore;

/// Resource service writing straight into an [`InMemoryStore`].
///
/// Mirrors the checks the host performs on the way in: a page title is
/// mandatory, a missing alias is derived from the title, and typed-field
/// values can only be written for fields that exist.
#[derive(Debug, Clone)]
pub struct InMemoryResourceService {
    store: Arc<InMemoryStore>,
}

impl InMemoryResourceService {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self { store }
    }
}

/// Derives a URL alias from a page title.
fn alias_for(title: &str) -> String {
    let mut alias = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            alias.extend(ch.to_lowercase());
        } else if !alias.ends_with('-') && !alias.is_empty() {
            alias.push('-');
        }
    }
    alias.trim_end_matches('-').to_string()
}

fn stored_value(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        Value::Null => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}

#[async_trait]
impl ResourceService for InMemoryResourceService {
    async fn create_resource(&self, payload: &Map<String, Value>) -> Result<Entity, StorageError> {
        let title = payload
            .get("pagetitle")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StorageError::resource_service("pagetitle is required"))?;

        let mut resource = self.store.create(EntityKind::Resource);
        resource.fields = payload.clone();
        if resource.get_str("alias").is_none_or(str::is_empty) {
            resource.set("alias", alias_for(title));
        }
        if resource.get("parent").is_none() {
            resource.set("parent", 0);
        }
        self.store.save(&mut resource).await?;
        Ok(resource)
    }

    async fn update_resource(
        &self,
        id: u64,
        payload: &Map<String, Value>,
    ) -> Result<Entity, StorageError> {
        let mut resource = self
            .store
            .fetch(EntityKind::Resource, id)
            .ok_or_else(|| StorageError::not_found(EntityKind::Resource, id))?;
        if payload
            .get("pagetitle")
            .and_then(Value::as_str)
            .is_some_and(str::is_empty)
        {
            return Err(StorageError::resource_service("pagetitle is required"));
        }
        for (field, value) in payload {
            resource.set(field.clone(), value.clone());
        }
        self.store.save(&mut resource).await?;
        Ok(resource)
    }

    async fn set_field_value(
        &self,
        resource_id: u64,
        field: &str,
        value: &Value,
    ) -> Result<(), StorageError> {
        if self.store.fetch(EntityKind::Resource, resource_id).is_none() {
            return Err(StorageError::not_found(EntityKind::Resource, resource_id));
        }
        let typed_field = self
            .store
            .get(EntityKind::TypedField, &Criteria::new().eq("name", field))
            .await?
            .ok_or_else(|| {
                StorageError::resource_service(format!("typed field {field} does not exist"))
            })?;

        let criteria = Criteria::new()
            .eq("tmplvarid", typed_field.id_or_zero())
            .eq("contentid", resource_id);
        let mut row = match self.store.get(EntityKind::TypedFieldValue, &criteria).await? {
            Some(row) => row,
            None => self
                .store
                .create(EntityKind::TypedFieldValue)
                .with("tmplvarid", typed_field.id_or_zero())
                .with("contentid", resource_id),
        };
        row.set("value", stored_value(value));
        self.store.save(&mut row).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_alias_for() {
        assert_eq!(alias_for("Blog Archive"), "blog-archive");
        assert_eq!(alias_for("  News & Events! "), "news-events");
    }

    #[tokio::test]
    async fn test_create_requires_title() {
        let service = InMemoryResourceService::new(Arc::new(InMemoryStore::new()));
        let err = service
            .create_resource(&payload(json!({"alias": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pagetitle"));
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let store = Arc::new(InMemoryStore::new());
        let service = InMemoryResourceService::new(store.clone());

        let created = service
            .create_resource(&payload(json!({"pagetitle": "Blog Home"})))
            .await
            .unwrap();
        assert_eq!(created.get_str("alias"), Some("blog-home"));
        assert_eq!(created.get_u64("parent"), Some(0));

        let updated = service
            .update_resource(
                created.id_or_zero(),
                &payload(json!({"pagetitle": "Blog", "published": true})),
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.get_str("pagetitle"), Some("Blog"));
        assert_eq!(updated.get_str("alias"), Some("blog-home"));

        assert!(service.update_resource(999, &Map::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_set_field_value_upserts() {
        let store = Arc::new(InMemoryStore::new());
        let service = InMemoryResourceService::new(store.clone());
        store.insert(EntityKind::TypedField, payload(json!({"name": "hero"})));
        let page = service
            .create_resource(&payload(json!({"pagetitle": "Home"})))
            .await
            .unwrap();

        service
            .set_field_value(page.id_or_zero(), "hero", &json!("a.png"))
            .await
            .unwrap();
        service
            .set_field_value(page.id_or_zero(), "hero", &json!(3))
            .await
            .unwrap();

        let rows = store.all(EntityKind::TypedFieldValue);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("value"), Some("3"));

        assert!(
            service
                .set_field_value(page.id_or_zero(), "missing", &json!("x"))
                .await
                .is_err()
        );
    }
}
