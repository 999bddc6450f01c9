// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the tunnel client.
///
/// The type is `Clone` because the client keeps the most recent failure as a
/// sticky error that every subsequent `accept` reports until the session is
/// running again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("tunnel client is closed")]
    ClientClosed,

    #[error("tunnel client is reconnecting")]
    ClientReconnecting,

    #[error("relay rejected the client credentials")]
    AuthFailed,

    #[error("could not connect to the relay")]
    RetryFailed,

    #[error("timed out connecting to the relay")]
    RetryTimedOut,

    #[error("failed to obtain configuration: {0}")]
    Configuration(String),

    #[error("invalid relay address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Whether the caller should simply try the operation again later.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Error::ClientReconnecting)
    }

    /// The error a failed background reconnection leaves behind for `accept`.
    pub fn into_sticky(self) -> Error {
        match self {
            Error::AuthFailed | Error::RetryTimedOut | Error::ClientClosed => self,
            _ => Error::RetryFailed,
        }
    }
}
