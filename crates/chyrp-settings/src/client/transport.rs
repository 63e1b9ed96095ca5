use crate::error::Result;
use crate::types::{EncodedSetting, Setting, SettingsMap};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Request/response mapper for the remote settings resource.
///
/// Implementations hold no state beyond their connection and never retry;
/// retry policy belongs to callers.
#[async_trait]
pub trait SettingsTransport: Send + Sync + 'static {
    /// Fetch the full settings key space.
    async fn fetch_all(&self) -> Result<SettingsMap>;

    /// Fetch the settings of one group.
    async fn fetch_by_group(&self, group: &str) -> Result<SettingsMap>;

    /// Write one setting and return what the server persisted.
    async fn update_one(&self, key: &str, setting: EncodedSetting) -> Result<Setting>;

    /// Write several settings in one request.
    async fn update_many(&self, settings: BTreeMap<String, EncodedSetting>) -> Result<SettingsMap>;
}
