//! # Tower Sessions Store for DynamoDB
//!
//! A session store for [`tower-sessions`](https://crates.io/crates/tower-sessions)
//! backed by a single DynamoDB table.
//!
//! The store also speaks the express-style `set`/`get`/`destroy`/`touch`
//! contract through [`SessionRepository`], with the same table layout,
//! options, and expiration rules as the express-session DynamoDB store, so
//! both kinds of application can share one table.
//!
//! ## Features
//!
//! - One item per session, keyed by a configurable prefix plus the session id
//! - Expiration from the cookie max-age or a default TTL, enforced on read
//! - Optional retention of expired items for out-of-band cleanup
//! - Throttled refreshes that only rewrite the expiry
//! - Table creation on first start
//! - An in-memory table for tests and local development
//!
//! ## Quick Start
//!
//! ```no_run
//! use time::Duration;
//! use tower_sessions::Expiry;
//! use tower_sessions_dynamodb_store::{DynamoDbStore, StoreOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Region, endpoint and credentials fall back to the AWS_* environment variables
//! let store = DynamoDbStore::connect(StoreOptions::default()).await?;
//!
//! let session_layer = tower_sessions::SessionManagerLayer::new(store)
//!     .with_expiry(Expiry::OnInactivity(Duration::days(7)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Express-style Usage
//!
//! ```
//! use serde_json::json;
//! use tower_sessions_dynamodb_store::{
//!     DynamoDbStore, MemoryTable, SessionData, SessionRepository, StoreOptions,
//! };
//!
//! # async fn example() -> Result<(), tower_sessions_dynamodb_store::Error> {
//! let options = StoreOptions::default()
//!     .with_table_name("test-sessions")
//!     .with_hash_key("test-sessionId")
//!     .with_hash_prefix("test:");
//! let store = DynamoDbStore::new(MemoryTable::new(), options)?;
//! store.ensure_table().await?;
//!
//! let mut session = SessionData::new();
//! session.insert("name", json!("x"));
//! store.set("abc", &session).await?;
//!
//! let loaded = store.get("abc").await?.expect("session was just stored");
//! assert_eq!(loaded.get("name"), Some(&json!("x")));
//!
//! store.destroy("abc").await?;
//! assert!(store.get("abc").await?.is_none());
//! # Ok(())
//! # }
//! ```

mod bootstrap;
pub mod config;
pub mod constants;
mod dynamodb_store;
pub mod entity;
mod error;
pub mod expiry;
mod repository;
mod session;
pub mod table;

/// The main store implementation.
///
/// See [`DynamoDbStore`] documentation for usage details.
pub use dynamodb_store::DynamoDbStore;

pub use bootstrap::{ensure_table, TableStatus};
pub use config::{process_env, resolve_config, ClientConfig, ClientOptions, StoreOptions, TableOptions};
pub use error::{Error, Result, TableError};
pub use repository::SessionRepository;
pub use session::SessionData;
pub use table::{MemoryTable, TableService};

#[cfg(feature = "dynamodb")]
pub use table::DynamoDbTable;

// Re-export necessary types from tower-sessions for convenience
/// Session storage error types and results
///
/// These are re-exported from the `tower-sessions` crate for convenience.
pub use tower_sessions::session_store;

/// Trait for implementing session store expiration cleanup
///
/// Implemented by `DynamoDbStore` with a scan over the session table.
pub use tower_sessions::ExpiredDeletion;

/// Session identifier type
pub use tower_sessions::session::Id;

/// Session record type
pub use tower_sessions::session::Record;

/// Session type for manipulating the current session
pub use tower_sessions::Session;

/// Trait for implementing session storage backends
pub use tower_sessions::SessionStore;
