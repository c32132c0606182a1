//! Table item models for tower-sessions-dynamodb-store.
//!
//! This module contains the shape of a session record as it is stored in the
//! table, and (with the `dynamodb` feature) the conversion between that shape
//! and DynamoDB attribute maps.

/// Session item stored under the table's hash key.
pub mod session;

#[cfg(feature = "dynamodb")]
pub(crate) mod attribute;
