//! Table provisioning run before the store is used.

use tracing::{debug, warn};

use crate::config::TableOptions;
use crate::error::{Error, Result, TableError};
use crate::table::TableService;

/// How [`ensure_table`] found the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    /// The table was already there.
    Existing,
    /// The table was created by this call.
    Created,
}

/// Makes sure the session table exists, creating it if needed.
///
/// Any describe failure is taken to mean the table is missing and a create is
/// attempted. Failures other than "not found" are logged, since they usually
/// point at credentials or connectivity and the create will fail the same
/// way. A create that loses the race against another instance creating the
/// same table counts as [`TableStatus::Existing`].
pub async fn ensure_table<S>(service: &S, table: &TableOptions) -> Result<TableStatus>
where
    S: TableService + ?Sized,
{
    match service.describe_table(table).await {
        Ok(description) => {
            debug!(table = %table.name, status = ?description.status, "table already exists");
            return Ok(TableStatus::Existing);
        }
        Err(TableError::TableNotFound(_)) => {
            debug!(table = %table.name, "table not found, creating it");
        }
        Err(err) => {
            warn!(table = %table.name, error = %err, "describe table failed, attempting to create it");
        }
    }

    match service.create_table(table).await {
        Ok(()) => {
            debug!(
                table = %table.name,
                hash_key = %table.hash_key,
                read_capacity_units = table.read_capacity_units,
                write_capacity_units = table.write_capacity_units,
                "table created"
            );
            Ok(TableStatus::Created)
        }
        Err(TableError::TableExists(_)) => {
            warn!(table = %table.name, "table was created concurrently by another instance");
            Ok(TableStatus::Existing)
        }
        Err(source) => {
            debug!(table = %table.name, error = %source, "error creating table");
            Err(Error::Provision {
                table: table.name.clone(),
                source,
            })
        }
    }
}
