// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::backoff::RetryConfig;
use crate::session::SessionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

/// Connection parameters for one (re)connect.
///
/// Produced by a [`Configurer`] and always replaced wholesale, so a token is
/// never paired with another refresh's identity or relay address.
#[derive(Clone, Default)]
pub struct Config {
    /// Client identity registered with the relay.
    pub id: String,
    /// Relay address (`http(s)://` or `ws(s)://`).
    pub tunnel_addr: String,
    /// Bearer token; should be freshly issued on every call to the configurer.
    pub token: String,
    pub retry: RetryConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("id", &self.id)
            .field("tunnel_addr", &self.tunnel_addr)
            .field("token", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

/// Produces a fresh [`Config`] whenever the client needs new credentials.
///
/// Implemented for async closures returning `anyhow::Result<Config>` and for
/// file-backed [`Settings`].
#[async_trait]
pub trait Configurer: Send + Sync + 'static {
    async fn configure(&self) -> anyhow::Result<Config>;
}

#[async_trait]
impl<F, Fut> Configurer for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Config>> + Send + 'static,
{
    async fn configure(&self) -> anyhow::Result<Config> {
        (self)().await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub relay: RelaySettings,
    pub client: ClientSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelaySettings {
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientSettings {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_elapsed_secs() -> u64 {
    180
}

fn default_stream_buffer_size() -> usize {
    4 * 1024
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_elapsed_secs: default_max_elapsed_secs(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            stream_buffer_size: default_stream_buffer_size(),
        }
    }
}

impl Settings {
    pub fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut settings = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("TUNNEL_ADDRESS") {
            self.relay.address = val;
        }
        if let Ok(val) = env::var("TUNNEL_CLIENT_ID") {
            self.client.id = val;
        }
        if let Ok(val) = env::var("TUNNEL_TOKEN") {
            self.auth.token = Some(val);
        }
        if let Ok(val) = env::var("TUNNEL_TOKEN_FILE") {
            self.auth.token_file = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("RETRY_INITIAL_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.retry.initial_delay_ms = ms;
            }
        }
        if let Ok(val) = env::var("RETRY_MAX_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                self.retry.max_delay_ms = ms;
            }
        }
        if let Ok(val) = env::var("RETRY_MAX_ELAPSED_SECS") {
            if let Ok(secs) = val.parse() {
                self.retry.max_elapsed_secs = secs;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.relay.address.is_empty() {
            anyhow::bail!("TUNNEL_ADDRESS is required");
        }
        websocktunnel_core::make_ws_url(&self.relay.address)?;
        if self.client.id.is_empty() {
            anyhow::bail!("TUNNEL_CLIENT_ID is required");
        }
        let has_token = self.auth.token.as_deref().is_some_and(|t| !t.is_empty());
        if !has_token && self.auth.token_file.is_none() {
            anyhow::bail!("TUNNEL_TOKEN or TUNNEL_TOKEN_FILE is required");
        }
        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            multiplier: self.retry.multiplier,
            max_elapsed_time: Duration::from_secs(self.retry.max_elapsed_secs),
        }
        .with_defaults()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            stream_buffer_size: self.session.stream_buffer_size,
        }
    }

    /// Reads the token file (when configured) so that a token rotated on disk
    /// is picked up by the next reconnect.
    pub async fn to_config(&self) -> anyhow::Result<Config> {
        let token = match &self.auth.token_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| {
                    anyhow::anyhow!("failed to read token file {}: {}", path.display(), e)
                })?
                .trim()
                .to_string(),
            None => self.auth.token.clone().unwrap_or_default(),
        };

        if token.is_empty() {
            anyhow::bail!("no bearer token available");
        }

        Ok(Config {
            id: self.client.id.clone(),
            tunnel_addr: self.relay.address.clone(),
            token,
            retry: self.retry_config(),
        })
    }
}

#[async_trait]
impl Configurer for Settings {
    async fn configure(&self) -> anyhow::Result<Config> {
        self.to_config().await
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            relay: RelaySettings::default(),
            client: ClientSettings::default(),
            auth: AuthSettings::default(),
            retry: RetrySettings::default(),
            session: SessionSettings::default(),
        }
    }
}
