// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::config::Config;
use async_trait::async_trait;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use websocktunnel_core::{bearer, classify_status, make_ws_url, StatusClass, CLIENT_URL_HEADER, ID_HEADER};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything one dial attempt needs, derived from the current [`Config`].
#[derive(Clone)]
pub struct DialRequest {
    pub url: String,
    pub id: String,
    pub token: String,
}

impl DialRequest {
    pub fn from_config(config: &Config) -> websocktunnel_core::Result<Self> {
        Ok(Self {
            url: make_ws_url(&config.tunnel_addr)?,
            id: config.id.clone(),
            token: config.token.clone(),
        })
    }

    pub fn headers(&self) -> [(&'static str, String); 2] {
        [("authorization", bearer(&self.token)), (ID_HEADER, self.id.clone())]
    }
}

impl std::fmt::Debug for DialRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialRequest")
            .field("url", &self.url)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A successful upgrade: the live connection and the public URL the relay
/// assigned to it.
#[derive(Debug)]
pub struct Dialed<C> {
    pub conn: C,
    pub url: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialError {
    #[error("transient dial failure: {0}")]
    Transient(String),

    #[error("relay rejected the credentials")]
    Unauthorized,

    #[error("relay refused the connection: {0}")]
    Rejected(String),
}

impl DialError {
    pub fn from_status(status: u16) -> Self {
        match classify_status(Some(status)) {
            StatusClass::Unauthorized => DialError::Unauthorized,
            StatusClass::Fatal => DialError::Rejected(format!("status {}", status)),
            StatusClass::Retryable => DialError::Transient(format!("status {}", status)),
        }
    }
}

/// Performs a single dial attempt against the relay.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Send + 'static;

    async fn dial(&self, request: &DialRequest) -> Result<Dialed<Self::Conn>, DialError>;
}

/// Dials the relay with a WebSocket upgrade.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Conn = WsStream;

    async fn dial(&self, request: &DialRequest) -> Result<Dialed<WsStream>, DialError> {
        let mut ws_request = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| DialError::Rejected(format!("invalid relay url: {}", e)))?;

        for (name, value) in request.headers() {
            let value = HeaderValue::from_str(&value)
                .map_err(|e| DialError::Rejected(format!("invalid {} header: {}", name, e)))?;
            ws_request.headers_mut().insert(name, value);
        }

        match tokio_tungstenite::connect_async(ws_request).await {
            Ok((conn, response)) => {
                let url = response
                    .headers()
                    .get(CLIENT_URL_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        DialError::Rejected(format!("relay response is missing {}", CLIENT_URL_HEADER))
                    })?;
                Ok(Dialed { conn, url })
            }
            Err(WsError::Http(response)) => Err(DialError::from_status(response.status().as_u16())),
            Err(e) => Err(DialError::Transient(e.to_string())),
        }
    }
}
