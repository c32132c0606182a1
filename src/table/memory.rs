use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::TableOptions;
use crate::entity::session::SessionItem;
use crate::error::TableError;

use super::{TableDescription, TableService};

#[derive(Debug, Default)]
struct Table {
    hash_key: String,
    items: HashMap<String, SessionItem>,
}

/// An in-process [`TableService`].
///
/// Tables must be created before use, exactly like the real service. Clones
/// share the same underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items in `table_name`, or `None` if the table does not exist.
    pub async fn len(&self, table_name: &str) -> Option<usize> {
        self.tables.read().await.get(table_name).map(|t| t.items.len())
    }

    /// Hash key attribute `table_name` was created with.
    pub async fn hash_key(&self, table_name: &str) -> Option<String> {
        self.tables
            .read()
            .await
            .get(table_name)
            .map(|t| t.hash_key.clone())
    }

    pub async fn delete_table(&self, table_name: &str) -> bool {
        self.tables.write().await.remove(table_name).is_some()
    }
}

fn not_found(table: &TableOptions) -> TableError {
    TableError::TableNotFound(table.name.clone())
}

#[async_trait]
impl TableService for MemoryTable {
    async fn describe_table(&self, table: &TableOptions) -> Result<TableDescription, TableError> {
        let tables = self.tables.read().await;
        if tables.contains_key(&table.name) {
            Ok(TableDescription {
                name: table.name.clone(),
                status: Some("ACTIVE".to_string()),
            })
        } else {
            Err(not_found(table))
        }
    }

    async fn create_table(&self, table: &TableOptions) -> Result<(), TableError> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(&table.name) {
            return Err(TableError::TableExists(table.name.clone()));
        }
        tables.insert(
            table.name.clone(),
            Table {
                hash_key: table.hash_key.clone(),
                items: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn get_item(&self, table: &TableOptions, key: &str) -> Result<Option<SessionItem>, TableError> {
        let tables = self.tables.read().await;
        let t = tables.get(&table.name).ok_or_else(|| not_found(table))?;
        Ok(t.items.get(key).cloned())
    }

    async fn put_item(&self, table: &TableOptions, item: SessionItem) -> Result<(), TableError> {
        let mut tables = self.tables.write().await;
        let t = tables.get_mut(&table.name).ok_or_else(|| not_found(table))?;
        t.items.insert(item.key.clone(), item);
        Ok(())
    }

    async fn update_expiry(
        &self,
        table: &TableOptions,
        key: &str,
        expires: i64,
        updated: i64,
    ) -> Result<bool, TableError> {
        let mut tables = self.tables.write().await;
        let t = tables.get_mut(&table.name).ok_or_else(|| not_found(table))?;
        match t.items.get_mut(key) {
            Some(item) => {
                item.expires = Some(expires);
                item.sess.set_updated(updated);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_item(&self, table: &TableOptions, key: &str) -> Result<(), TableError> {
        let mut tables = self.tables.write().await;
        let t = tables.get_mut(&table.name).ok_or_else(|| not_found(table))?;
        t.items.remove(key);
        Ok(())
    }

    async fn scan_expired(&self, table: &TableOptions, now: i64) -> Result<Vec<String>, TableError> {
        let tables = self.tables.read().await;
        let t = tables.get(&table.name).ok_or_else(|| not_found(table))?;
        Ok(t.items
            .values()
            .filter(|item| item.key.starts_with(&table.hash_prefix))
            .filter(|item| item.expires.map_or(true, |expires| expires <= now))
            .map(|item| item.key.clone())
            .collect())
    }
}
