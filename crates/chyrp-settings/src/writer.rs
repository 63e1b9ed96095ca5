//! Settings write coordinator.
//!
//! Every confirmed write is followed by a full reload of the store instead
//! of a local patch, so the read-model always holds what the server
//! persisted, including any coercion it applied. A failed write leaves the
//! store untouched.

use crate::client::SettingsTransport;
use crate::error::{Result, SettingsError};
use crate::snapshot::SettingsSnapshot;
use crate::store::SettingsStore;
use crate::types::{EncodedSetting, SettingType, SettingValue, SettingsMap};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of a confirmed write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// What the server reported as stored.
    pub persisted: SettingsMap,
    /// Snapshot produced by the reload that followed the write, or `None`
    /// if that reload failed (the store then carries the error).
    pub snapshot: Option<Arc<SettingsSnapshot>>,
}

impl WriteOutcome {
    pub fn is_refreshed(&self) -> bool {
        self.snapshot.is_some()
    }
}

#[derive(Clone)]
pub struct SettingsWriter {
    transport: Arc<dyn SettingsTransport>,
    store: SettingsStore,
}

impl SettingsWriter {
    pub fn new(transport: Arc<dyn SettingsTransport>, store: SettingsStore) -> Self {
        Self { transport, store }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Write one already-encoded setting.
    pub async fn update_setting(&self, key: &str, data: EncodedSetting) -> Result<WriteOutcome> {
        validate_key(key)?;
        data.validate()?;

        let setting = self.transport.update_one(key, data).await?;
        tracing::info!("Setting '{}' updated", setting.key);

        let mut persisted = SettingsMap::new();
        persisted.insert(setting.key, setting.value);
        Ok(self.reload(persisted).await)
    }

    /// Write several already-encoded settings in one request.
    pub async fn update_settings(
        &self,
        settings: BTreeMap<String, EncodedSetting>,
    ) -> Result<WriteOutcome> {
        if settings.is_empty() {
            return Err(SettingsError::Validation("No settings to update".into()));
        }
        for (key, data) in &settings {
            validate_key(key)?;
            data.validate()?;
        }

        let count = settings.len();
        let persisted = self.transport.update_many(settings).await?;
        tracing::info!("{} settings updated", count);
        Ok(self.reload(persisted).await)
    }

    /// Write one value, inferring its type from its shape unless `kind` is
    /// given.
    pub async fn update_by_key_value<V: Serialize>(
        &self,
        key: &str,
        value: V,
        kind: Option<SettingType>,
    ) -> Result<WriteOutcome> {
        let value = to_json(&value)?;
        let encoded = encode(value, kind)?;
        self.update_setting(key, encoded).await
    }

    /// Write every member of an object, each with its inferred type.
    pub async fn update_from_object<O: Serialize>(&self, object: O) -> Result<WriteOutcome> {
        let serde_json::Value::Object(members) = to_json(&object)? else {
            return Err(SettingsError::Validation(
                "Settings must be given as an object".into(),
            ));
        };

        let settings = members
            .into_iter()
            .map(|(key, value)| encode(value, None).map(|encoded| (key, encoded)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        self.update_settings(settings).await
    }

    async fn reload(&self, persisted: SettingsMap) -> WriteOutcome {
        let snapshot = match self.store.refresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Write succeeded but reloading settings failed: {}", e);
                None
            }
        };
        WriteOutcome {
            persisted,
            snapshot,
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() || key.trim() != key {
        return Err(SettingsError::Validation(format!("Invalid setting key {:?}", key)));
    }
    Ok(())
}

fn to_json<V: Serialize>(value: &V) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| SettingsError::Validation(format!("Value is not serializable: {}", e)))
}

fn encode(value: serde_json::Value, kind: Option<SettingType>) -> Result<EncodedSetting> {
    let value = match kind {
        Some(kind) => SettingValue::coerce(value, kind)?,
        None => SettingValue::infer(value)?,
    };
    value.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_infers_boolean() {
        let encoded = encode(json!(true), None).unwrap();
        assert_eq!(encoded, EncodedSetting::new("true", SettingType::Boolean));
    }

    #[test]
    fn test_encode_infers_json_for_objects() {
        let encoded = encode(json!({"github": "me"}), None).unwrap();
        assert_eq!(encoded.kind, SettingType::Json);
        assert_eq!(encoded.value, r#"{"github":"me"}"#);
    }

    #[test]
    fn test_encode_explicit_type() {
        let encoded = encode(json!("12"), Some(SettingType::Number)).unwrap();
        assert_eq!(encoded, EncodedSetting::new("12", SettingType::Number));
        assert!(encode(json!("twelve"), Some(SettingType::Number)).is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("site_title").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(" site_title").is_err());
    }

    #[test]
    fn test_non_string_map_keys_are_rejected() {
        let mut value = BTreeMap::new();
        value.insert(vec![1u8, 2], "x");
        let err = to_json(&value).unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));
    }
}
