//! Composition root for the settings core.

use crate::client::{ClientConfig, HttpTransport, SettingsTransport};
use crate::error::Result;
use crate::store::{LoadStatus, SettingsStore};
use crate::writer::SettingsWriter;
use std::sync::Arc;

/// Transport, store and writer wired together, with the first load done.
#[derive(Clone)]
pub struct SettingsConsole {
    transport: Arc<dyn SettingsTransport>,
    store: SettingsStore,
    writer: SettingsWriter,
}

impl SettingsConsole {
    /// Build an HTTP-backed console and await the initial load.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::bootstrap(Arc::new(transport)).await)
    }

    /// Wire the components around `transport` and await the initial load.
    ///
    /// A failed first load does not fail startup: the store reports
    /// [`LoadStatus::Error`] and serves defaults until a retry succeeds.
    pub async fn bootstrap(transport: Arc<dyn SettingsTransport>) -> Self {
        let store = SettingsStore::new(Arc::clone(&transport));
        let writer = SettingsWriter::new(Arc::clone(&transport), store.clone());

        match store.load().await {
            Ok(snapshot) => {
                tracing::info!("Settings console ready ({} settings)", snapshot.len())
            }
            Err(e) => tracing::warn!("Settings console started without settings: {}", e),
        }

        Self {
            transport,
            store,
            writer,
        }
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn writer(&self) -> &SettingsWriter {
        &self.writer
    }

    /// Direct transport access for reads the store does not cache, such as
    /// a single group.
    pub fn transport(&self) -> &Arc<dyn SettingsTransport> {
        &self.transport
    }

    pub fn is_ready(&self) -> bool {
        self.store.status() == LoadStatus::Ready
    }

    pub fn dispose(&self) {
        self.store.dispose();
    }
}
