use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::UPDATED_FIELD;

/// The application data of a session, stored verbatim.
///
/// The store reads two well-known fields from the payload:
///
/// - `cookie.maxAge`: the cookie lifetime in milliseconds. When present and
///   integral it takes precedence over the store's default TTL.
/// - `updated`: the time of the last write in milliseconds since epoch. The
///   store sets it on every write and uses it to throttle refreshes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(Map<String, Value>);

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets `cookie.maxAge`, keeping any other cookie fields.
    pub fn with_cookie_max_age(mut self, max_age_ms: i64) -> Self {
        let cookie = self
            .0
            .entry("cookie")
            .or_insert_with(|| Value::Object(Map::new()));
        if !cookie.is_object() {
            *cookie = Value::Object(Map::new());
        }
        if let Value::Object(fields) = cookie {
            fields.insert("maxAge".to_string(), Value::from(max_age_ms));
        }
        self
    }

    /// The cookie lifetime in milliseconds, if the payload carries an integral one.
    pub fn cookie_max_age(&self) -> Option<i64> {
        self.0
            .get("cookie")
            .and_then(|cookie| cookie.get("maxAge"))
            .and_then(as_integer)
    }

    /// The last write time in milliseconds since epoch.
    pub fn updated(&self) -> Option<i64> {
        self.0.get(UPDATED_FIELD).and_then(as_integer)
    }

    pub(crate) fn set_updated(&mut self, now_ms: i64) {
        self.0.insert(UPDATED_FIELD.to_string(), Value::from(now_ms));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SessionData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// Integral floats (e.g. `100000.0`) count as integers.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    value
        .as_f64()
        .filter(|n| n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64)
        .map(|n| n as i64)
}
