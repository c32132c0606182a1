//! Conversion between session items and DynamoDB attribute maps.
//!
//! The payload is stored as a native map so that single fields (the
//! `updated` marker) can be targeted by update expressions.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use crate::constants::{EXPIRES_ATTRIBUTE, SESSION_ATTRIBUTE};
use crate::entity::session::SessionItem;
use crate::error::TableError;

pub(crate) type Item = HashMap<String, AttributeValue>;

pub(crate) fn to_item(hash_key: &str, item: SessionItem) -> Item {
    let mut attributes = HashMap::with_capacity(3);
    attributes.insert(hash_key.to_string(), AttributeValue::S(item.key));
    if let Some(expires) = item.expires {
        attributes.insert(EXPIRES_ATTRIBUTE.to_string(), AttributeValue::N(expires.to_string()));
    }
    attributes.insert(
        SESSION_ATTRIBUTE.to_string(),
        AttributeValue::M(map_to_attributes(item.sess.into_map())),
    );
    attributes
}

pub(crate) fn from_item(hash_key: &str, mut item: Item) -> Result<SessionItem, TableError> {
    let key = match item.remove(hash_key) {
        Some(AttributeValue::S(key)) => key,
        Some(_) => return Err(TableError::Malformed(format!("`{hash_key}` is not a string"))),
        None => return Err(TableError::Malformed(format!("`{hash_key}` is missing"))),
    };

    let expires = match item.remove(EXPIRES_ATTRIBUTE) {
        Some(AttributeValue::N(n)) => Some(parse_epoch(&n)?),
        Some(AttributeValue::Null(_)) | None => None,
        Some(_) => {
            return Err(TableError::Malformed(format!(
                "`{EXPIRES_ATTRIBUTE}` of `{key}` is not a number"
            )))
        }
    };

    let sess = match item.remove(SESSION_ATTRIBUTE) {
        Some(AttributeValue::M(map)) => attributes_to_map(map)?,
        None => Map::new(),
        Some(_) => {
            return Err(TableError::Malformed(format!(
                "`{SESSION_ATTRIBUTE}` of `{key}` is not a map"
            )))
        }
    };

    Ok(SessionItem {
        key,
        expires,
        sess: sess.into(),
    })
}

// Expiry numbers written by other tools may carry a fraction; floor it.
fn parse_epoch(raw: &str) -> Result<i64, TableError> {
    if let Ok(seconds) = raw.parse::<i64>() {
        return Ok(seconds);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n.floor() as i64)
        .ok_or_else(|| TableError::Malformed(format!("`{raw}` is not an epoch timestamp")))
}

pub(crate) fn to_attribute(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(map_to_attributes(map)),
    }
}

pub(crate) fn from_attribute(value: AttributeValue) -> Result<Value, TableError> {
    Ok(match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(parse_number(&n)?),
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(attributes_to_map(map)?),
        AttributeValue::Ss(values) => Value::Array(values.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<Result<_, _>>()?,
        ),
        other => {
            return Err(TableError::Malformed(format!(
                "unsupported attribute in session payload: {other:?}"
            )))
        }
    })
}

fn parse_number(raw: &str) -> Result<Number, TableError> {
    raw.parse::<Number>()
        .map_err(|_| TableError::Malformed(format!("`{raw}` is not a number")))
}

fn map_to_attributes(map: Map<String, Value>) -> HashMap<String, AttributeValue> {
    map.into_iter().map(|(k, v)| (k, to_attribute(v))).collect()
}

fn attributes_to_map(map: HashMap<String, AttributeValue>) -> Result<Map<String, Value>, TableError> {
    map.into_iter()
        .map(|(k, v)| from_attribute(v).map(|v| (k, v)))
        .collect()
}
