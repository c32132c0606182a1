//! Store options and client configuration.
//!
//! Options deserialize from the same camelCase shape used by the express
//! store this crate is compatible with:
//!
//! ```json
//! {
//!   "table": { "name": "sessions", "hashKey": "sessionId", "hashPrefix": "sess:" },
//!   "ttl": 86400000,
//!   "touchInterval": 30000,
//!   "keepExpired": false,
//!   "dynamoConfig": { "region": "eu-west-1", "endpoint": "http://localhost:8000" }
//! }
//! ```

use std::collections::HashMap;
use std::ffi::OsString;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::error::{Error, Result};

/// Table identity and the throughput requested when it has to be created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableOptions {
    pub name: String,
    pub hash_key: String,
    pub hash_prefix: String,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            hash_key: DEFAULT_HASH_KEY.to_string(),
            hash_prefix: DEFAULT_HASH_PREFIX.to_string(),
            read_capacity_units: DEFAULT_RCU,
            write_capacity_units: DEFAULT_WCU,
        }
    }
}

impl TableOptions {
    /// Storage key for a raw session id: `hash_prefix + sid`.
    pub fn key_for(&self, sid: &str) -> String {
        format!("{}{}", self.hash_prefix, sid)
    }

    fn validate(&self) -> Result<()> {
        let name_ok = (3..=255).contains(&self.name.len())
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !name_ok {
            return Err(Error::Config(format!(
                "table name `{}` must be 3 to 255 characters of [A-Za-z0-9_.-]",
                self.name
            )));
        }
        if self.hash_key.is_empty() {
            return Err(Error::Config("hash key must not be empty".into()));
        }
        if self.read_capacity_units < 1 || self.write_capacity_units < 1 {
            return Err(Error::Config(format!(
                "capacity units must be positive (read: {}, write: {})",
                self.read_capacity_units, self.write_capacity_units
            )));
        }
        Ok(())
    }
}

/// Connection options for the DynamoDB client.
///
/// Anything left unset falls back to the environment, see [`resolve_config`].
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Total attempts per request, including the first one.
    pub max_attempts: Option<u32>,
    /// Per-operation timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "** redacted **");
        f.debug_struct("ClientOptions")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("session_token", &redacted(&self.session_token))
            .field("max_attempts", &self.max_attempts)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Options recognized by [`DynamoDbStore`](crate::DynamoDbStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreOptions {
    pub table: TableOptions,
    /// Default session lifetime in milliseconds.
    pub ttl: u64,
    /// Minimum milliseconds between persisted refreshes. `0` always refreshes.
    pub touch_interval: u64,
    /// Keep expired records in the table instead of deleting them on read.
    pub keep_expired: bool,
    pub dynamo_config: ClientOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table: TableOptions::default(),
            ttl: DEFAULT_TTL_MS,
            touch_interval: DEFAULT_TOUCH_INTERVAL_MS,
            keep_expired: DEFAULT_KEEP_EXPIRED,
            dynamo_config: ClientOptions::default(),
        }
    }
}

impl StoreOptions {
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table.name = name.into();
        self
    }

    pub fn with_hash_key(mut self, hash_key: impl Into<String>) -> Self {
        self.table.hash_key = hash_key.into();
        self
    }

    pub fn with_hash_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table.hash_prefix = prefix.into();
        self
    }

    pub fn with_capacity_units(mut self, read: i64, write: i64) -> Self {
        self.table.read_capacity_units = read;
        self.table.write_capacity_units = write;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = duration_millis(ttl);
        self
    }

    pub fn with_touch_interval(mut self, interval: Duration) -> Self {
        self.touch_interval = duration_millis(interval);
        self
    }

    pub fn with_keep_expired(mut self, keep_expired: bool) -> Self {
        self.keep_expired = keep_expired;
        self
    }

    pub fn with_client_options(mut self, client: ClientOptions) -> Self {
        self.dynamo_config = client;
        self
    }

    /// Default TTL as a signed duration, clamped to `i64::MAX` milliseconds.
    pub(crate) fn default_ttl(&self) -> time::Duration {
        time::Duration::milliseconds(i64::try_from(self.ttl).unwrap_or(i64::MAX))
    }

    pub fn validate(&self) -> Result<()> {
        self.table.validate()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Static credentials for the client.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .finish()
    }
}

/// Snapshot of the process environment for [`resolve_config`].
///
/// Variables whose name or value is not valid UTF-8 are skipped.
pub fn process_env() -> HashMap<String, String> {
    env_map(std::env::vars_os())
}

fn env_map<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub credentials: Option<StaticCredentials>,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
}

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_DYNAMO_ENDPOINT: &str = "AWS_DYNAMO_ENDPOINT";

/// Merges explicit client options with environment values.
///
/// Explicit options win field by field. Credentials are taken as a pair: an
/// access key id without a secret (or the reverse) is a configuration error.
pub fn resolve_config(explicit: &ClientOptions, env: &HashMap<String, String>) -> Result<ClientConfig> {
    let lookup = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    let region = explicit
        .region
        .clone()
        .or_else(|| lookup(ENV_DEFAULT_REGION))
        .or_else(|| lookup(ENV_REGION));
    let endpoint = explicit
        .endpoint
        .clone()
        .or_else(|| lookup(ENV_DYNAMO_ENDPOINT));

    let access_key_id = explicit
        .access_key_id
        .clone()
        .or_else(|| lookup(ENV_ACCESS_KEY_ID));
    let secret_access_key = explicit
        .secret_access_key
        .clone()
        .or_else(|| lookup(ENV_SECRET_ACCESS_KEY));
    let credentials = match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
            access_key_id,
            secret_access_key,
            session_token: explicit
                .session_token
                .clone()
                .or_else(|| lookup(ENV_SESSION_TOKEN)),
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(Error::Config("access key id given without a secret access key".into()))
        }
        (None, Some(_)) => {
            return Err(Error::Config("secret access key given without an access key id".into()))
        }
    };

    if explicit.max_attempts == Some(0) {
        return Err(Error::Config("max attempts must be at least 1".into()));
    }

    Ok(ClientConfig {
        region,
        endpoint,
        credentials,
        max_attempts: explicit.max_attempts,
        timeout: explicit.timeout_ms.map(Duration::from_millis),
    })
}
