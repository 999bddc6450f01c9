// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

//! Seam to the stream-multiplexing layer.
//!
//! The tunnel client never frames streams itself. It hands each fresh relay
//! connection to a [`Multiplexer`], and accepts logical streams from the
//! resulting [`Session`] until that session fails.

use async_trait::async_trait;
use std::fmt;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub stream_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_buffer_size: 4 * 1024,
        }
    }
}

/// Local address descriptor of a session. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAddr {
    pub network: String,
    pub address: String,
}

impl SessionAddr {
    pub fn new(network: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for SessionAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.address)
    }
}

#[async_trait]
pub trait Session: Send + Sync + 'static {
    type Stream: Send + 'static;

    /// Waits for the next inbound logical stream. An error means the session
    /// is unusable; the client will replace it.
    async fn accept(&self) -> io::Result<Self::Stream>;

    async fn close(&self) -> io::Result<()>;

    fn local_addr(&self) -> SessionAddr;
}

/// Wraps a freshly dialed relay connection into a client-side session.
pub trait Multiplexer<C>: Send + Sync + 'static {
    type Session: Session;

    fn client(&self, conn: C, config: &SessionConfig) -> Self::Session;
}

impl<C, S, F> Multiplexer<C> for F
where
    F: Fn(C, &SessionConfig) -> S + Send + Sync + 'static,
    S: Session,
{
    type Session = S;

    fn client(&self, conn: C, config: &SessionConfig) -> S {
        (self)(conn, config)
    }
}
