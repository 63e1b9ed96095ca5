//! A single named setting.

use crate::types::SettingValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// Decoded settings keyed by name.
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// A named configuration value as the server persisted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: SettingValue,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
