use std::collections::BTreeMap;

use async_trait::async_trait;
use pkgsync_storage::{
    ModelRegistry, PRIMARY_INDEX, SchemaIntrospector, SchemaManager, StorageError,
};
use tokio::sync::RwLock;

/// Column and index names of a table, either declared by a model or live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableShape {
    pub columns: Vec<String>,
    pub indexes: Vec<String>,
}

impl TableShape {
    pub fn new<C, I>(columns: C, indexes: I) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            indexes: indexes.into_iter().map(Into::into).collect(),
        }
    }
}

/// A DDL operation applied to the in-memory schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOp {
    CreateTable(String),
    DropTable(String),
    AddColumn(String, String),
    AlterColumn(String, String),
    DropColumn(String, String),
    AddIndex(String, String),
    DropIndex(String, String),
}

/// A package model registered through [`ModelRegistry::register_package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPackage {
    pub namespace: String,
    pub model_path: String,
    pub table_prefix: String,
}

#[derive(Debug, Default)]
struct SchemaState {
    declared: BTreeMap<String, TableShape>,
    live: BTreeMap<String, TableShape>,
    journal: Vec<SchemaOp>,
    registered: Vec<RegisteredPackage>,
    loaded_classes: Vec<String>,
}

/// In-memory relational schema.
///
/// Holds two views of every model table: the *declared* shape (what the
/// package model files describe) and the *live* shape (what exists in the
/// database). DDL operations change the live shape and are recorded in a
/// journal, in the order they were issued.
#[derive(Debug, Default)]
pub struct InMemorySchema {
    state: RwLock<SchemaState>,
}

impl InMemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the model metadata of `table`, replacing any previous declaration.
    pub async fn declare_model(&self, table: &str, shape: TableShape) {
        self.state
            .write()
            .await
            .declared
            .insert(table.to_string(), shape);
    }

    /// Creates a live table directly, bypassing the journal.
    pub async fn seed_table(&self, table: &str, shape: TableShape) {
        self.state.write().await.live.insert(table.to_string(), shape);
    }

    /// Live shape of `table`, if it exists.
    pub async fn table(&self, table: &str) -> Option<TableShape> {
        self.state.read().await.live.get(table).cloned()
    }

    /// Names of all live tables.
    pub async fn table_names(&self) -> Vec<String> {
        self.state.read().await.live.keys().cloned().collect()
    }

    pub async fn journal(&self) -> Vec<SchemaOp> {
        self.state.read().await.journal.clone()
    }

    pub async fn clear_journal(&self) {
        self.state.write().await.journal.clear();
    }

    pub async fn registered_packages(&self) -> Vec<RegisteredPackage> {
        self.state.read().await.registered.clone()
    }

    pub async fn loaded_classes(&self) -> Vec<String> {
        self.state.read().await.loaded_classes.clone()
    }
}

fn missing_table(table: &str) -> StorageError {
    StorageError::schema(table, "table does not exist")
}

fn missing_model(table: &str) -> StorageError {
    StorageError::schema(table, "no model metadata declared")
}

#[async_trait]
impl SchemaIntrospector for InMemorySchema {
    async fn list_columns(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        state
            .live
            .get(table)
            .map(|shape| shape.columns.clone())
            .ok_or_else(|| missing_table(table))
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        state
            .live
            .get(table)
            .map(|shape| {
                shape
                    .indexes
                    .iter()
                    .filter(|index| index.as_str() != PRIMARY_INDEX)
                    .cloned()
                    .collect()
            })
            .ok_or_else(|| missing_table(table))
    }
}

#[async_trait]
impl SchemaManager for InMemorySchema {
    async fn create_table(&self, table: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.live.contains_key(table) {
            return Ok(());
        }
        let shape = state
            .declared
            .get(table)
            .cloned()
            .ok_or_else(|| missing_model(table))?;
        state.live.insert(table.to_string(), shape);
        state.journal.push(SchemaOp::CreateTable(table.to_string()));
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.live.remove(table).is_some() {
            state.journal.push(SchemaOp::DropTable(table.to_string()));
        }
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let shape = state.live.get_mut(table).ok_or_else(|| missing_table(table))?;
        if shape.columns.iter().any(|c| c == column) {
            return Err(StorageError::schema(
                table,
                format!("column {column} already exists"),
            ));
        }
        shape.columns.push(column.to_string());
        state
            .journal
            .push(SchemaOp::AddColumn(table.to_string(), column.to_string()));
        Ok(())
    }

    async fn alter_column(&self, table: &str, column: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let shape = state.live.get(table).ok_or_else(|| missing_table(table))?;
        if !shape.columns.iter().any(|c| c == column) {
            return Err(StorageError::schema(
                table,
                format!("column {column} does not exist"),
            ));
        }
        state
            .journal
            .push(SchemaOp::AlterColumn(table.to_string(), column.to_string()));
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let shape = state.live.get_mut(table).ok_or_else(|| missing_table(table))?;
        shape.columns.retain(|c| c != column);
        state
            .journal
            .push(SchemaOp::DropColumn(table.to_string(), column.to_string()));
        Ok(())
    }

    async fn add_index(&self, table: &str, index: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let shape = state.live.get_mut(table).ok_or_else(|| missing_table(table))?;
        if shape.indexes.iter().any(|i| i == index) {
            return Err(StorageError::schema(
                table,
                format!("index {index} already exists"),
            ));
        }
        shape.indexes.push(index.to_string());
        state
            .journal
            .push(SchemaOp::AddIndex(table.to_string(), index.to_string()));
        Ok(())
    }

    async fn drop_index(&self, table: &str, index: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let shape = state.live.get_mut(table).ok_or_else(|| missing_table(table))?;
        shape.indexes.retain(|i| i != index);
        state
            .journal
            .push(SchemaOp::DropIndex(table.to_string(), index.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ModelRegistry for InMemorySchema {
    async fn register_package(
        &self,
        namespace: &str,
        model_path: &str,
        table_prefix: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        state.registered.push(RegisteredPackage {
            namespace: namespace.to_string(),
            model_path: model_path.to_string(),
            table_prefix: table_prefix.to_string(),
        });
        Ok(())
    }

    async fn load_class(&self, class: &str) -> Result<(), StorageError> {
        self.state
            .write()
            .await
            .loaded_classes
            .push(class.to_string());
        Ok(())
    }

    async fn field_meta(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        state
            .declared
            .get(table)
            .map(|shape| shape.columns.clone())
            .ok_or_else(|| missing_model(table))
    }

    async fn index_meta(&self, table: &str) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        state
            .declared
            .get(table)
            .map(|shape| shape.indexes.clone())
            .ok_or_else(|| missing_model(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_table_from_declared_model() {
        let schema = InMemorySchema::new();
        schema
            .declare_model("BlogPost", TableShape::new(["id", "title"], ["PRIMARY", "title"]))
            .await;

        schema.create_table("BlogPost").await.unwrap();
        schema.create_table("BlogPost").await.unwrap();

        assert_eq!(schema.journal().await, vec![SchemaOp::CreateTable("BlogPost".into())]);
        assert_eq!(schema.list_columns("BlogPost").await.unwrap(), vec!["id", "title"]);
        assert_eq!(schema.list_indexes("BlogPost").await.unwrap(), vec!["title"]);
    }

    #[tokio::test]
    async fn test_create_table_without_model_fails() {
        let schema = InMemorySchema::new();
        let err = schema.create_table("Ghost").await.unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[tokio::test]
    async fn test_drop_missing_table_is_noop() {
        let schema = InMemorySchema::new();
        schema.drop_table("Ghost").await.unwrap();
        assert!(schema.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_column_operations() {
        let schema = InMemorySchema::new();
        schema
            .seed_table("BlogPost", TableShape::new(["id", "old"], ["PRIMARY"]))
            .await;

        schema.add_column("BlogPost", "body").await.unwrap();
        schema.alter_column("BlogPost", "id").await.unwrap();
        schema.drop_column("BlogPost", "old").await.unwrap();

        assert!(schema.add_column("BlogPost", "body").await.is_err());
        assert!(schema.alter_column("BlogPost", "old").await.is_err());
        assert_eq!(
            schema.table("BlogPost").await.unwrap().columns,
            vec!["id", "body"]
        );
        assert_eq!(schema.journal().await.len(), 3);
    }

    #[tokio::test]
    async fn test_registry_records_packages_and_classes() {
        let schema = InMemorySchema::new();
        schema
            .register_package("blog", "/pkgs/blog/core/components/blog/model/", "blog_")
            .await
            .unwrap();
        schema.load_class("BlogBase").await.unwrap();

        let registered = schema.registered_packages().await;
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].table_prefix, "blog_");
        assert_eq!(schema.loaded_classes().await, vec!["BlogBase"]);
        assert!(schema.field_meta("BlogBase").await.is_err());
    }
}
