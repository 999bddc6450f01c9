// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod reconnect;
pub mod session;

pub use backoff::{Backoff, RetryConfig};
pub use client::{ClientState, TunnelClient};
pub use config::{Config, Configurer, Settings};
pub use connection::{Connector, DialError, DialRequest, Dialed, WsConnector, WsStream};
pub use reconnect::Reconnector;
pub use session::{Multiplexer, Session, SessionAddr, SessionConfig};
pub use websocktunnel_core::{Error, Result};
