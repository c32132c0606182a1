//! Default values for store options.

/// Table used when no name is configured.
pub const DEFAULT_TABLE_NAME: &str = "sessions";

/// Hash key attribute of the session table.
pub const DEFAULT_HASH_KEY: &str = "sessionId";

/// Prefix prepended to every session id before it is used as a key.
pub const DEFAULT_HASH_PREFIX: &str = "sess:";

/// Read capacity units requested when the table is created.
pub const DEFAULT_RCU: i64 = 5;

/// Write capacity units requested when the table is created.
pub const DEFAULT_WCU: i64 = 5;

/// One day, in milliseconds.
pub const DEFAULT_TTL_MS: u64 = 86_400_000;

/// Thirty seconds, in milliseconds.
pub const DEFAULT_TOUCH_INTERVAL_MS: u64 = 30_000;

pub const DEFAULT_KEEP_EXPIRED: bool = false;

/// Attribute holding the expiration instant in seconds since epoch.
pub const EXPIRES_ATTRIBUTE: &str = "expires";

/// Attribute holding the session payload.
pub const SESSION_ATTRIBUTE: &str = "sess";

/// Field added to every payload with the last write time in milliseconds.
pub const UPDATED_FIELD: &str = "updated";
