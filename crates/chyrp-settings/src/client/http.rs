//! reqwest-backed settings transport.

use crate::client::config::ClientConfig;
use crate::client::transport::SettingsTransport;
use crate::client::wire::{self, BulkUpdate};
use crate::error::{Result, SettingsError};
use crate::types::{EncodedSetting, Setting, SettingsMap};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const SETTINGS_PATH: &str = "settings";

/// Settings transport over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    config: Arc<ClientConfig>,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .user_agent(config.user_agent.clone());

        if !config.proxy_url.is_empty() {
            let proxy = reqwest::Proxy::all(&config.proxy_url)
                .map_err(|e| SettingsError::Config(format!("Invalid proxy_url: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SettingsError::Config(e.to_string()))?;
        Self::with_client(client, config)
    }

    /// Use an existing reqwest client (shared connection pool).
    pub fn with_client(client: Client, config: ClientConfig) -> Result<Self> {
        let base = config.api_url()?;
        Ok(Self {
            client,
            base,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `{base}/settings[/{key}]`, with the key encoded as one path segment.
    fn settings_url(&self, key: Option<&str>) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SettingsError::Config(format!("base_url {} cannot be a base", self.base))
            })?;
            segments.pop_if_empty().push(SETTINGS_PATH);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send and return the body of a 2xx response.
    async fn send(&self, builder: RequestBuilder) -> Result<Vec<u8>> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let text = String::from_utf8_lossy(&body);
        let message = wire::error_message(&text).unwrap_or_else(|| reason(status));
        tracing::debug!("Settings API answered {}: {}", status.as_u16(), message);
        Err(SettingsError::api(status.as_u16(), message))
    }
}

#[async_trait]
impl SettingsTransport for HttpTransport {
    async fn fetch_all(&self) -> Result<SettingsMap> {
        let url = self.settings_url(None)?;
        tracing::debug!("GET {}", url);
        let body = self.send(self.request(Method::GET, url)).await?;
        wire::decode_map(&body)
    }

    async fn fetch_by_group(&self, group: &str) -> Result<SettingsMap> {
        let group = non_empty(group, "group")?;
        let mut url = self.settings_url(None)?;
        url.query_pairs_mut().append_pair("group", group);
        tracing::debug!("GET {}", url);
        let body = self.send(self.request(Method::GET, url)).await?;
        wire::decode_map(&body)
    }

    async fn update_one(&self, key: &str, setting: EncodedSetting) -> Result<Setting> {
        let key = non_empty(key, "key")?;
        let url = self.settings_url(Some(key))?;
        tracing::debug!("PUT {} ({})", url, setting.kind);
        let body = self
            .send(self.request(Method::PUT, url).json(&setting))
            .await?;
        Ok(wire::decode_one(key, &body, &setting))
    }

    async fn update_many(&self, settings: BTreeMap<String, EncodedSetting>) -> Result<SettingsMap> {
        if let Some(key) = settings.keys().find(|k| k.trim().is_empty()) {
            return Err(SettingsError::Validation(format!("Invalid setting key {:?}", key)));
        }
        let url = self.settings_url(None)?;
        tracing::debug!("PUT {} ({} settings)", url, settings.len());
        let payload = BulkUpdate {
            settings: &settings,
        };
        let body = self
            .send(self.request(Method::PUT, url).json(&payload))
            .await?;
        Ok(wire::decode_many(&body, &settings))
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::Validation(format!("Setting {} must not be empty", what)));
    }
    Ok(trimmed)
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
