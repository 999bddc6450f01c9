// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::{Error, Result};

/// Header carrying the client identity on the upgrade request.
pub const ID_HEADER: &str = "x-websocktunnel-id";

/// Header on the relay's upgrade response carrying the public URL.
pub const CLIENT_URL_HEADER: &str = "x-websocktunnel-client-url";

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Converts a relay address into the WebSocket URL to dial.
///
/// `http://` becomes `ws://` and `https://` becomes `wss://`; WebSocket
/// schemes pass through untouched.
pub fn make_ws_url(address: &str) -> Result<String> {
    let address = address.trim();
    let (scheme, rest) = address
        .split_once("://")
        .ok_or_else(|| Error::InvalidAddress(format!("missing scheme in {:?}", address)))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::InvalidAddress(format!(
                "unsupported scheme {:?} in {:?}",
                other, address
            )))
        }
    };

    if rest.is_empty() {
        return Err(Error::InvalidAddress(format!("missing host in {:?}", address)));
    }

    Ok(format!("{}://{}", ws_scheme, rest))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusClass {
    /// Transport trouble or a server-side status; try again after a backoff.
    Retryable,
    /// 401: the credentials will never be accepted.
    Unauthorized,
    /// Any other 4xx, or a 2xx that did not complete the upgrade.
    Fatal,
}

/// Classifies the HTTP status of a failed upgrade. `None` means the dial
/// failed before any response arrived.
pub fn classify_status(status: Option<u16>) -> StatusClass {
    match status {
        None => StatusClass::Retryable,
        Some(401) => StatusClass::Unauthorized,
        Some(code) if code / 100 == 4 || code / 100 == 2 => StatusClass::Fatal,
        Some(_) => StatusClass::Retryable,
    }
}
