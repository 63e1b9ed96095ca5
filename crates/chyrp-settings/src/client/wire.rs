//! Decoding of settings response bodies.
//!
//! Bodies are objects keyed by setting name, optionally wrapped as
//! `{"settings": {...}}`. Each entry is either a `{value, type}` record or,
//! for older endpoints, a bare JSON value whose type is inferred.

use crate::error::{Result, SettingsError};
use crate::types::{EncodedSetting, Setting, SettingValue, SettingsMap};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

const ENVELOPE_KEY: &str = "settings";

/// Body of a bulk update request.
#[derive(Debug, Serialize)]
pub(crate) struct BulkUpdate<'a> {
    pub settings: &'a BTreeMap<String, EncodedSetting>,
}

pub(crate) fn decode_map(body: &[u8]) -> Result<SettingsMap> {
    let root: Value = serde_json::from_slice(body)?;
    let object = match root {
        Value::Object(object) => unwrap_envelope(object),
        other => {
            return Err(SettingsError::Decode(format!(
                "Expected a settings object, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut map = SettingsMap::new();
    for (key, entry) in object {
        if let Some(value) = decode_entry(entry)? {
            map.insert(key, value);
        }
    }
    Ok(map)
}

/// Decode the response to a single-key update. The request already
/// succeeded, so a body that is empty or carries no value for `key` (a bare
/// acknowledgement) means the server stored exactly what was sent.
pub(crate) fn decode_one(key: &str, body: &[u8], sent: &EncodedSetting) -> Setting {
    let echoed = || Setting::new(key, sent.decode());
    if is_blank(body) {
        return echoed();
    }

    let root: Value = match serde_json::from_slice(body) {
        Ok(root) => root,
        Err(e) => {
            warn!("Unreadable update response for {}: {}", key, e);
            return echoed();
        }
    };
    if let Some(record) = as_record(&root) {
        return Setting::new(key, record.decode());
    }

    let entry = match root {
        Value::Object(object) => unwrap_envelope(object).remove(key),
        _ => None,
    };
    match entry.map(decode_entry) {
        Some(Ok(Some(value))) => Setting::new(key, value),
        _ => {
            warn!(
                "Update response does not carry a value for {}, assuming it was stored as sent",
                key
            );
            echoed()
        }
    }
}

/// Decode the response to a bulk update. Only the keys that were sent are
/// reported; any the body does not carry are taken as stored as sent.
pub(crate) fn decode_many(body: &[u8], sent: &BTreeMap<String, EncodedSetting>) -> SettingsMap {
    let returned = if is_blank(body) {
        SettingsMap::new()
    } else {
        match decode_map(body) {
            Ok(map) => map,
            Err(e) => {
                warn!("Unreadable bulk update response: {}", e);
                SettingsMap::new()
            }
        }
    };

    let mut echoed = 0;
    let persisted: SettingsMap = sent
        .iter()
        .map(|(key, encoded)| {
            let value = returned.get(key).cloned().unwrap_or_else(|| {
                echoed += 1;
                encoded.decode()
            });
            (key.clone(), value)
        })
        .collect();
    if echoed > 0 && !is_blank(body) {
        warn!(
            "Bulk update response omitted {} of {} keys, assuming they were stored as sent",
            echoed,
            sent.len()
        );
    }
    persisted
}

/// Pull a human-readable message out of an error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        for field in ["error", "message"] {
            match object.get(field) {
                Some(Value::String(msg)) if !msg.trim().is_empty() => {
                    return Some(msg.trim().to_string())
                }
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(msg)) = inner.get("message") {
                        return Some(msg.trim().to_string());
                    }
                }
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn unwrap_envelope(mut object: Map<String, Value>) -> Map<String, Value> {
    match object.remove(ENVELOPE_KEY) {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            object.insert(ENVELOPE_KEY.to_string(), other);
            object
        }
        None => object,
    }
}

fn decode_entry(entry: Value) -> Result<Option<SettingValue>> {
    if entry.is_null() {
        return Ok(None);
    }
    if let Some(record) = as_record(&entry) {
        return Ok(Some(record.decode()));
    }
    SettingValue::infer(entry).map(Some).map_err(|e| match e {
        SettingsError::Validation(msg) => SettingsError::Decode(msg),
        other => other,
    })
}

fn as_record(value: &Value) -> Option<EncodedSetting> {
    let object = value.as_object()?;
    let text = object.get("value")?.as_str()?;
    let kind = object.get("type")?.as_str()?.parse().ok()?;
    Some(EncodedSetting::new(text, kind))
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
