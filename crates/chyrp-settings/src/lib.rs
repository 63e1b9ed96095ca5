//! Settings synchronization core for the Chyrp Lite Reimagine console.
//!
//! - [`client`]: the [`SettingsTransport`] seam and its HTTP implementation
//! - [`store`]: the single-flight, versioned read-model
//! - [`writer`]: write-then-reload coordinator
//! - [`access`]: the access gate over permission and session signals
//! - [`console`]: wires the above together at startup

pub mod access;
pub mod client;
pub mod console;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod writer;

pub use access::{AccessGate, GateState, GateView, PermissionState, SessionState};
pub use client::{ClientConfig, HttpTransport, SettingsTransport};
pub use console::SettingsConsole;
pub use error::{Result, SettingsError};
pub use snapshot::{Field, SettingsSnapshot, SiteFields};
pub use store::{LoadStatus, SettingsStore, StoreState};
pub use types::{EncodedSetting, Setting, SettingType, SettingValue, SettingsMap};
pub use writer::{SettingsWriter, WriteOutcome};
