//! Settings read-model store.
//!
//! One versioned snapshot of the full settings key space, replaced wholesale
//! by [`SettingsStore::load`]. Loads are single-flight: callers that arrive
//! while a load is running await the same request and see the same outcome.
//! A failed load keeps the last good snapshot and records the error.

use crate::client::SettingsTransport;
use crate::error::{Result, SettingsError};
use crate::snapshot::{Field, SettingsSnapshot, SiteFields};
use crate::types::{SettingValue, SettingsMap};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<SettingsSnapshot>>>>;

/// Lifecycle of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Created, never loaded.
    Idle,
    Loading,
    Ready,
    /// The last load failed. A previous snapshot may still be served.
    Error,
    Disposed,
}

/// Everything a view observes. Published as one value so status and
/// snapshot never disagree.
#[derive(Debug, Clone)]
pub struct StoreState {
    pub status: LoadStatus,
    pub snapshot: Option<Arc<SettingsSnapshot>>,
    pub last_error: Option<SettingsError>,
}

impl StoreState {
    fn idle() -> Self {
        Self {
            status: LoadStatus::Idle,
            snapshot: None,
            last_error: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == LoadStatus::Ready
    }
}

struct Inner {
    transport: Arc<dyn SettingsTransport>,
    state: watch::Sender<StoreState>,
    in_flight: Mutex<Option<LoadFuture>>,
}

/// Handle to the settings read-model. Clones share the same store.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

impl SettingsStore {
    pub fn new(transport: Arc<dyn SettingsTransport>) -> Self {
        let (state, _) = watch::channel(StoreState::idle());
        Self {
            inner: Arc::new(Inner {
                transport,
                state,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Fetch the full key space and replace the snapshot.
    ///
    /// Joins the running load if there is one. Failures are returned to the
    /// caller and also recorded in the store state.
    pub async fn load(&self) -> Result<Arc<SettingsSnapshot>> {
        let load = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(load) = in_flight.as_ref() {
                tracing::debug!("Joining in-flight settings load");
                load.clone()
            } else {
                if self.status() == LoadStatus::Disposed {
                    return Err(SettingsError::Disposed);
                }
                let load = self.start_load();
                *in_flight = Some(load.clone());
                load
            }
        };
        load.await
    }

    /// Load with a fetch that is guaranteed to start after this call.
    ///
    /// A load that was already running may have read the server before a
    /// write landed, so it is awaited and then a new one is issued.
    pub async fn refresh(&self) -> Result<Arc<SettingsSnapshot>> {
        let running = self.inner.in_flight.lock().clone();
        if let Some(running) = running {
            let _ = running.await;
        }
        self.load().await
    }

    fn start_load(&self) -> LoadFuture {
        self.inner.state.send_modify(|state| state.status = LoadStatus::Loading);

        // The future is stored in `inner`, so it only holds a weak reference back.
        let transport = Arc::clone(&self.inner.transport);
        let inner = Arc::downgrade(&self.inner);
        let future = async move {
            let result = transport.fetch_all().await;
            let Some(inner) = inner.upgrade() else {
                return Err(SettingsError::Disposed);
            };
            let outcome = inner.complete(result);
            // Cleared after publishing: a caller that finds no load in flight
            // already sees this outcome.
            inner.in_flight.lock().take();
            outcome
        };
        future.boxed().shared()
    }

    /// Current status.
    pub fn status(&self) -> LoadStatus {
        self.inner.state.borrow().status
    }

    pub fn state(&self) -> StoreState {
        self.inner.state.borrow().clone()
    }

    /// Message-bearing error of the last failed load, cleared on success.
    pub fn last_error(&self) -> Option<SettingsError> {
        self.inner.state.borrow().last_error.clone()
    }

    /// Last good snapshot, if any load ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<SettingsSnapshot>> {
        self.inner.state.borrow().snapshot.clone()
    }

    /// Version of the current snapshot; 0 before the first success.
    pub fn version(&self) -> u64 {
        self.snapshot().map_or(0, |s| s.version())
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.inner.state.subscribe()
    }

    /// Named fields from the current snapshot, or their defaults.
    pub fn fields(&self) -> SiteFields {
        self.snapshot()
            .map(|snapshot| snapshot.fields().clone())
            .unwrap_or_default()
    }

    pub fn get_field(&self, field: Field) -> SettingValue {
        match self.snapshot() {
            Some(snapshot) => snapshot.fields().get(field),
            None => field.default_value(),
        }
    }

    /// Look up any setting, falling back to `default` when it is absent.
    pub fn get_setting(&self, key: &str, default: impl Into<SettingValue>) -> SettingValue {
        self.snapshot()
            .and_then(|s| s.get(key).cloned())
            .unwrap_or_else(|| default.into())
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.typed(key, |v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.typed(key, SettingValue::as_bool).unwrap_or(default)
    }

    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        self.typed(key, SettingValue::as_number).unwrap_or(default)
    }

    pub fn get_json(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.typed(key, |v| v.as_json().cloned()).unwrap_or(default)
    }

    fn typed<T>(&self, key: &str, pick: impl FnOnce(&SettingValue) -> Option<T>) -> Option<T> {
        let state = self.inner.state.borrow();
        state.snapshot.as_ref()?.get(key).and_then(pick)
    }

    /// End the store's lifecycle. Later loads fail with
    /// [`SettingsError::Disposed`] without reaching the transport.
    pub fn dispose(&self) {
        self.inner.in_flight.lock().take();
        self.inner.state.send_modify(|state| state.status = LoadStatus::Disposed);
        tracing::debug!("Settings store disposed");
    }
}

impl Inner {
    /// Publish a load outcome. The only place the snapshot changes.
    fn complete(&self, result: Result<SettingsMap>) -> Result<Arc<SettingsSnapshot>> {
        let mut outcome = Err(SettingsError::Disposed);
        self.state.send_modify(|state| {
            if state.status == LoadStatus::Disposed {
                return;
            }
            match result {
                Ok(values) => {
                    let version = state.snapshot.as_ref().map_or(0, |s| s.version()) + 1;
                    let snapshot = Arc::new(SettingsSnapshot::new(values, version));
                    tracing::info!(
                        "Loaded {} settings (version {})",
                        snapshot.len(),
                        version
                    );
                    state.snapshot = Some(Arc::clone(&snapshot));
                    state.status = LoadStatus::Ready;
                    state.last_error = None;
                    outcome = Ok(snapshot);
                }
                Err(e) => {
                    if state.snapshot.is_some() {
                        tracing::warn!("Settings load failed, serving stale snapshot: {}", e);
                    } else {
                        tracing::warn!("Settings load failed: {}", e);
                    }
                    state.status = LoadStatus::Error;
                    state.last_error = Some(e.clone());
                    outcome = Err(e);
                }
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EncodedSetting, Setting};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct Fixed(SettingsMap);

    #[async_trait]
    impl SettingsTransport for Fixed {
        async fn fetch_all(&self) -> Result<SettingsMap> {
            Ok(self.0.clone())
        }

        async fn fetch_by_group(&self, _group: &str) -> Result<SettingsMap> {
            Ok(SettingsMap::new())
        }

        async fn update_one(&self, key: &str, setting: EncodedSetting) -> Result<Setting> {
            Ok(Setting::new(key, setting.decode()))
        }

        async fn update_many(&self, _: BTreeMap<String, EncodedSetting>) -> Result<SettingsMap> {
            Ok(SettingsMap::new())
        }
    }

    fn store() -> SettingsStore {
        let mut values = SettingsMap::new();
        values.insert("site_title".into(), "My Blog".into());
        SettingsStore::new(Arc::new(Fixed(values)))
    }

    #[test]
    fn test_new_store_is_idle_with_defaults() {
        let store = store();
        assert_eq!(store.status(), LoadStatus::Idle);
        assert_eq!(store.version(), 0);
        assert!(store.snapshot().is_none());
        assert_eq!(store.fields().site_title, "Chyrp Lite");
        assert_eq!(store.get_setting("missing", 7i64), SettingValue::Number(7.0));
    }

    #[tokio::test]
    async fn test_load_sets_ready() {
        let store = store();
        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(store.status(), LoadStatus::Ready);
        assert_eq!(store.get_string("site_title", ""), "My Blog");
        assert!(store.inner.in_flight.lock().is_none());
    }

    #[tokio::test]
    async fn test_versions_increase() {
        let store = store();
        store.load().await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(second.version(), 2);
    }

    #[tokio::test]
    async fn test_dispose_blocks_loads() {
        let store = store();
        store.dispose();
        assert_eq!(store.load().await.unwrap_err(), SettingsError::Disposed);
        assert_eq!(store.status(), LoadStatus::Disposed);
    }

    #[tokio::test]
    async fn test_typed_getter_wrong_type_uses_default() {
        let store = store();
        store.load().await.unwrap();
        assert!(store.get_bool("site_title", true));
        assert_eq!(store.get_number("site_title", 1.5), 1.5);
    }
}
