//! In-memory settings server used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chyrp_settings::{
    EncodedSetting, Result, Setting, SettingType, SettingsError, SettingsMap, SettingsTransport,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Largest `posts_per_page` the fake server accepts; larger values are clamped.
pub const MAX_POSTS_PER_PAGE: f64 = 50.0;

#[derive(Default)]
pub struct FakeServer {
    stored: Mutex<BTreeMap<String, EncodedSetting>>,
    fetches: AtomicUsize,
    writes: Mutex<Vec<(String, EncodedSetting)>>,
    hold: Mutex<Option<Arc<Notify>>>,
    fail_fetch: Mutex<Option<SettingsError>>,
    fail_write: Mutex<Option<SettingsError>>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(entries: &[(&str, &str, SettingType)]) -> Arc<Self> {
        let server = Self::new();
        for (key, value, kind) in entries {
            server.put(key, value, *kind);
        }
        server
    }

    pub fn put(&self, key: &str, value: &str, kind: SettingType) {
        self.stored
            .lock()
            .insert(key.to_string(), EncodedSetting::new(value, kind));
    }

    pub fn stored(&self, key: &str) -> Option<EncodedSetting> {
        self.stored.lock().get(key).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(String, EncodedSetting)> {
        self.writes.lock().clone()
    }

    /// Make the next fetches wait until the returned `Notify` is signalled.
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock() = Some(Arc::clone(&notify));
        notify
    }

    pub fn release_fetches(&self) {
        if let Some(notify) = self.hold.lock().take() {
            notify.notify_one();
        }
    }

    pub fn fail_next_fetch(&self, err: SettingsError) {
        *self.fail_fetch.lock() = Some(err);
    }

    pub fn fail_next_write(&self, err: SettingsError) {
        *self.fail_write.lock() = Some(err);
    }

    fn snapshot(&self) -> SettingsMap {
        self.stored
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.decode()))
            .collect()
    }

    /// Store a value the way the server would, clamping `posts_per_page`.
    fn store_one(&self, key: &str, mut setting: EncodedSetting) -> EncodedSetting {
        if key == "posts_per_page" {
            if let Ok(n) = setting.value.parse::<f64>() {
                setting.value = n.min(MAX_POSTS_PER_PAGE).to_string();
            }
        }
        self.writes.lock().push((key.to_string(), setting.clone()));
        self.stored.lock().insert(key.to_string(), setting.clone());
        setting
    }
}

#[async_trait]
impl SettingsTransport for FakeServer {
    async fn fetch_all(&self) -> Result<SettingsMap> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Read before waiting, so a held fetch returns the data as it was
        // when the request reached the server.
        let snapshot = self.snapshot();
        let hold = self.hold.lock().clone();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        if let Some(err) = self.fail_fetch.lock().take() {
            return Err(err);
        }
        Ok(snapshot)
    }

    async fn fetch_by_group(&self, group: &str) -> Result<SettingsMap> {
        let prefix = format!("{}_", group);
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .collect())
    }

    async fn update_one(&self, key: &str, setting: EncodedSetting) -> Result<Setting> {
        if let Some(err) = self.fail_write.lock().take() {
            return Err(err);
        }
        let stored = self.store_one(key, setting);
        Ok(Setting::new(key, stored.decode()))
    }

    async fn update_many(&self, settings: BTreeMap<String, EncodedSetting>) -> Result<SettingsMap> {
        if let Some(err) = self.fail_write.lock().take() {
            return Err(err);
        }
        Ok(settings
            .into_iter()
            .map(|(key, setting)| {
                let stored = self.store_one(&key, setting);
                (key, stored.decode())
            })
            .collect())
    }
}
