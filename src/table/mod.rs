//! The key-value table service backing the store.
//!
//! [`TableService`] is the narrow set of primitives the store needs. The
//! production implementation talks to DynamoDB; [`MemoryTable`] keeps
//! everything in process and is meant for tests and local development.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::config::TableOptions;
use crate::entity::session::SessionItem;
use crate::error::TableError;

mod memory;
pub use memory::MemoryTable;

#[cfg(feature = "dynamodb")]
mod dynamodb;
#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbTable;

/// What a successful describe-table call reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub name: String,
    /// Service-reported status, e.g. `ACTIVE` or `CREATING`.
    pub status: Option<String>,
}

/// Primitive operations against a single-hash-key table.
///
/// Every method addresses the table named by `table.name` and keys items by
/// the `table.hash_key` attribute. Implementations perform at most one
/// round trip per call, except [`scan_expired`](Self::scan_expired) which
/// pages through the table.
#[async_trait]
pub trait TableService: Debug + Send + Sync + 'static {
    async fn describe_table(&self, table: &TableOptions) -> Result<TableDescription, TableError>;

    /// Creates the table with a string hash key and the configured throughput.
    ///
    /// Fails with [`TableError::TableExists`] if the name is already taken.
    async fn create_table(&self, table: &TableOptions) -> Result<(), TableError>;

    /// Strongly consistent point read.
    async fn get_item(&self, table: &TableOptions, key: &str) -> Result<Option<SessionItem>, TableError>;

    /// Writes `item`, replacing any existing item with the same key.
    async fn put_item(&self, table: &TableOptions, item: SessionItem) -> Result<(), TableError>;

    /// Sets `expires` and `sess.updated` on an existing item.
    ///
    /// Returns `false` without writing anything when no item exists under
    /// `key`.
    async fn update_expiry(
        &self,
        table: &TableOptions,
        key: &str,
        expires: i64,
        updated: i64,
    ) -> Result<bool, TableError>;

    /// Deletes the item under `key`. Deleting a missing item succeeds.
    async fn delete_item(&self, table: &TableOptions, key: &str) -> Result<(), TableError>;

    /// Keys under `table.hash_prefix` whose `expires` is missing or not after
    /// `now` (seconds since epoch).
    async fn scan_expired(&self, table: &TableOptions, now: i64) -> Result<Vec<String>, TableError>;
}
