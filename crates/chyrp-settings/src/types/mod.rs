//! Setting types shared by the transport, store and writer.

mod setting;
mod value;

pub use setting::{Setting, SettingsMap};
pub use value::{EncodedSetting, SettingType, SettingValue};
