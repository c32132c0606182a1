//! Session item model.
//!
//! A session is persisted as a single item keyed by the configured hash key.
//!
//! | Attribute      | Type | Description                                   |
//! |----------------|------|-----------------------------------------------|
//! | `<hashKey>`    | S    | Hash prefix followed by the session id        |
//! | `expires`      | N    | Expiration instant in seconds since epoch     |
//! | `sess`         | M    | Session payload, including `updated` (ms)     |

use time::OffsetDateTime;

use crate::expiry;
use crate::session::SessionData;

/// A session record as stored in the table.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionItem {
    /// Prefixed session id; the table's sole hash key.
    pub key: String,

    /// Expiration in whole seconds since epoch.
    ///
    /// Always set on items written by the store. Items written by other
    /// tools may lack it, in which case they are treated as expired.
    pub expires: Option<i64>,

    /// The session payload.
    pub sess: SessionData,
}

impl SessionItem {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        expiry::is_expired(self.expires, now)
    }
}
