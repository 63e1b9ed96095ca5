//! Typed setting values and their wire encoding.
//!
//! The server stores every value as a string plus a `type` tag. Values are
//! decoded into [`SettingValue`] at the transport boundary so nothing above
//! it handles untyped data.

use crate::error::{Result, SettingsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type tag stored next to each value on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Boolean,
    Number,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::Boolean => "boolean",
            SettingType::Number => "number",
            SettingType::Json => "json",
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingType {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(SettingType::String),
            "boolean" | "bool" => Ok(SettingType::Boolean),
            "number" => Ok(SettingType::Number),
            "json" => Ok(SettingType::Json),
            other => Err(SettingsError::Validation(format!(
                "Unknown setting type: {}",
                other
            ))),
        }
    }
}

/// A decoded setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool), // Must be before Number so `true` never reads as 1
    Number(f64),
    String(String),
    Json(serde_json::Value),
}

impl SettingValue {
    pub fn setting_type(&self) -> SettingType {
        match self {
            SettingValue::String(_) => SettingType::String,
            SettingValue::Bool(_) => SettingType::Boolean,
            SettingValue::Number(_) => SettingType::Number,
            SettingValue::Json(_) => SettingType::Json,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            SettingValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Encode into the `{value, type}` form the server stores.
    pub fn encode(&self) -> Result<EncodedSetting> {
        let value = match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Bool(b) => b.to_string(),
            SettingValue::Number(n) => format_number(*n)?,
            SettingValue::Json(v) => serde_json::to_string(v)
                .map_err(|e| SettingsError::Validation(format!("Unserializable value: {}", e)))?,
        };
        Ok(EncodedSetting {
            value,
            kind: self.setting_type(),
        })
    }

    /// Build a value from an arbitrary JSON value, inferring the type from
    /// its shape. `null` carries no type and becomes an empty string.
    pub fn infer(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(SettingValue::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(SettingValue::Number)
                .ok_or_else(|| SettingsError::Validation(format!("Unrepresentable number: {}", n))),
            serde_json::Value::String(s) => Ok(SettingValue::String(s)),
            serde_json::Value::Null => Ok(SettingValue::String(String::new())),
            v @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                Ok(SettingValue::Json(v))
            }
        }
    }

    /// Coerce an arbitrary JSON value into the requested type.
    ///
    /// The textual form of the value must be valid for `kind`.
    pub fn coerce(value: serde_json::Value, kind: SettingType) -> Result<Self> {
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other if kind == SettingType::Json => return Ok(SettingValue::Json(other)),
            other => other.to_string(),
        };
        parse_as(&text, kind).ok_or_else(|| {
            SettingsError::Validation(format!("Value {:?} is not a valid {}", text, kind))
        })
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::String(s) => f.write_str(s),
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Number(n) => write!(f, "{}", n),
            SettingValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::String(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::String(s)
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        SettingValue::Number(n)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Number(n as f64)
    }
}

/// Wire form of a value: a string plus its type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSetting {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: SettingType,
}

impl EncodedSetting {
    pub fn new(value: impl Into<String>, kind: SettingType) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    /// Check that `value` parses as `kind` before it is sent.
    pub fn validate(&self) -> Result<()> {
        parse_as(&self.value, self.kind).map(|_| ()).ok_or_else(|| {
            SettingsError::Validation(format!(
                "Value {:?} is not a valid {}",
                self.value, self.kind
            ))
        })
    }

    /// Decode the stored string according to its tag.
    ///
    /// Text that does not parse as its tag is kept as a plain string.
    pub fn decode(&self) -> SettingValue {
        parse_as(&self.value, self.kind).unwrap_or_else(|| {
            tracing::warn!(
                "Stored value {:?} does not parse as {}, keeping it as a string",
                self.value,
                self.kind
            );
            SettingValue::String(self.value.clone())
        })
    }
}

fn parse_as(text: &str, kind: SettingType) -> Option<SettingValue> {
    match kind {
        SettingType::String => Some(SettingValue::String(text.to_string())),
        SettingType::Boolean => parse_bool(text).map(SettingValue::Bool),
        SettingType::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(SettingValue::Number),
        SettingType::Json => serde_json::from_str(text).ok().map(SettingValue::Json),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn format_number(n: f64) -> Result<String> {
    if !n.is_finite() {
        return Err(SettingsError::Validation(format!(
            "Number {} cannot be stored",
            n
        )));
    }
    Ok(n.to_string())
}
