//! Error types for the store and the table service it talks to.

use tower_sessions::session_store;

/// Errors reported by a [`TableService`](crate::table::TableService).
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The table does not exist.
    #[error("table `{0}` not found")]
    TableNotFound(String),

    /// A table with the same name already exists (or is being created).
    #[error("table `{0}` already exists")]
    TableExists(String),

    /// A stored item could not be decoded.
    #[error("malformed item: {0}")]
    Malformed(String),

    /// Any other failure returned by the service or its client.
    #[error("{0}")]
    Service(String),
}

/// Errors returned by [`DynamoDbStore`](crate::DynamoDbStore).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or incomplete store options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The table did not exist and could not be created.
    #[error("failed to provision table `{table}`: {source}")]
    Provision {
        table: String,
        #[source]
        source: TableError,
    },

    /// A read or write against the table failed.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A value could not be converted to an instant.
    #[error("`{0}` is not a valid timestamp")]
    InvalidTimestamp(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for session_store::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Table(TableError::Malformed(_)) | Error::InvalidTimestamp(_) => {
                session_store::Error::Decode(err.to_string())
            }
            _ => session_store::Error::Backend(err.to_string()),
        }
    }
}
