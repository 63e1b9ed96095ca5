//! Settings transport: the trait seam and its HTTP implementation.

mod config;
mod http;
mod transport;
mod wire;

pub use config::{ClientConfig, ENV_API_TOKEN, ENV_API_URL};
pub use http::HttpTransport;
pub use transport::SettingsTransport;
