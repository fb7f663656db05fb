//! Response envelope normalization
//!
//! The backend wraps payloads as `{ "data": ... }`, but list endpoints are not
//! consistent about what sits inside: a Spring-style page (`data.content`), a
//! named page (`data.cases.content`), a named array (`data.tasks`), a bare
//! array under `data`, or a bare array body. Every REST consumer goes through
//! this module instead of probing shapes at the call site.
//!
//! # Search order for lists
//! 1. `data.content`
//! 2. `data.<key>.content` for each key
//! 3. `data.<key>` for each key
//! 4. `data` (array)
//! 5. `content` (array)
//! 6. the body itself (array)
//!
//! The first array found wins. No array at all yields an empty list.

use crate::error::ModelError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Locate the list payload in a response body
#[must_use]
pub fn find_list<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    let data = body.get("data");

    if let Some(items) = data.and_then(|d| d.get("content")).and_then(Value::as_array) {
        return Some(items);
    }

    if let Some(data) = data {
        for key in keys {
            if let Some(items) = data
                .get(*key)
                .and_then(|nested| nested.get("content"))
                .and_then(Value::as_array)
            {
                return Some(items);
            }
        }
        for key in keys {
            if let Some(items) = data.get(*key).and_then(Value::as_array) {
                return Some(items);
            }
        }
        if let Some(items) = data.as_array() {
            return Some(items);
        }
    }

    body.get("content")
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
}

/// Decode a list payload, tolerating shape drift
///
/// Items that fail to decode are skipped with a warning rather than failing
/// the whole list.
#[must_use]
pub fn unwrap_list<T: DeserializeOwned>(body: &Value, keys: &[&str]) -> Vec<T> {
    let Some(items) = find_list(body, keys) else {
        tracing::debug!("no list payload found (searched keys {:?})", keys);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("skipping undecodable list item: {}", e);
                None
            }
        })
        .collect()
}

/// Decode a single entity payload
///
/// Reads `data` when the body is an envelope, else the body itself.
///
/// # Errors
/// `ModelError::EmptyEnvelope` for a null payload, `ModelError::Decode` when
/// the payload does not match `T`.
pub fn unwrap_entity<T: DeserializeOwned>(
    body: &Value,
    what: &'static str,
) -> Result<T, ModelError> {
    let payload = match body.get("data") {
        Some(data) => data,
        None => body,
    };

    if payload.is_null() {
        return Err(ModelError::EmptyEnvelope(what));
    }

    T::deserialize(payload).map_err(|source| ModelError::Decode { what, source })
}

/// Read a boolean out of an envelope (`{data: true}`, `{data: {allowed: true}}`, `true`)
#[must_use]
pub fn unwrap_flag(body: &Value) -> bool {
    let payload = body.get("data").unwrap_or(body);
    match payload {
        Value::Bool(b) => *b,
        Value::Object(map) => ["allowed", "hasPermission", "granted"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_bool))
            .unwrap_or(false),
        _ => false,
    }
}
