// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::config::Configurer;
use crate::connection::{Connector, Dialed, WsConnector};
use crate::reconnect::Reconnector;
use crate::session::{Multiplexer, Session, SessionAddr, SessionConfig};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use websocktunnel_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Running,
    Broken,
    Closed,
}

type StreamOf<C, M> = <<M as Multiplexer<<C as Connector>::Conn>>::Session as Session>::Stream;

/// Serves inbound streams that the relay multiplexes over one outbound
/// connection.
///
/// When the session breaks, `accept` reports [`Error::ClientReconnecting`]
/// while a single background task reconnects; once it succeeds, `accept`
/// works again and [`TunnelClient::endpoint`] reports the new public URL.
pub struct TunnelClient<C, M>
where
    C: Connector,
    M: Multiplexer<C::Conn>,
{
    shared: Arc<Shared<C, M>>,
}

impl<C, M> Clone for TunnelClient<C, M>
where
    C: Connector,
    M: Multiplexer<C::Conn>,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<C, M>
where
    C: Connector,
    M: Multiplexer<C::Conn>,
{
    reconnector: Reconnector<C>,
    multiplexer: M,
    session_config: SessionConfig,
    inner: Mutex<Inner<M::Session>>,
    url: watch::Sender<Arc<str>>,
    closed: watch::Sender<bool>,
}

struct Inner<S> {
    state: ClientState,
    accept_err: Option<Error>,
    session: Option<Arc<S>>,
    addr: SessionAddr,
    /// Bumped each time a session is installed.
    generation: u64,
    reconnecting: bool,
}

impl<M> TunnelClient<WsConnector, M>
where
    M: Multiplexer<<WsConnector as Connector>::Conn>,
{
    /// Connects to the relay over a WebSocket upgrade.
    pub async fn connect(configurer: impl Configurer, multiplexer: M) -> Result<Self> {
        Self::new(configurer, WsConnector, multiplexer).await
    }
}

impl<C, M> TunnelClient<C, M>
where
    C: Connector,
    M: Multiplexer<C::Conn>,
{
    pub async fn new(configurer: impl Configurer, connector: C, multiplexer: M) -> Result<Self> {
        Self::with_session_config(configurer, connector, multiplexer, SessionConfig::default()).await
    }

    /// Fails, without creating a client, when the initial connect fails.
    pub async fn with_session_config(
        configurer: impl Configurer,
        connector: C,
        multiplexer: M,
        session_config: SessionConfig,
    ) -> Result<Self> {
        let reconnector = Reconnector::new(Arc::new(configurer), connector).await?;
        let Dialed { conn, url } = reconnector.connect_with_retry().await?;

        let session = multiplexer.client(conn, &session_config);
        let addr = session.local_addr();
        info!(url = %url, "tunnel client running");

        let (url, _) = watch::channel(Arc::<str>::from(url));
        let (closed, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                reconnector,
                multiplexer,
                session_config,
                inner: Mutex::new(Inner {
                    state: ClientState::Running,
                    accept_err: None,
                    session: Some(Arc::new(session)),
                    addr,
                    generation: 0,
                    reconnecting: false,
                }),
                url,
                closed,
            }),
        })
    }

    /// Public URL at which the relay serves this client. Never blocks.
    pub fn endpoint(&self) -> String {
        self.shared.url.borrow().to_string()
    }

    /// Waits for the next inbound stream.
    ///
    /// Returns [`Error::ClientReconnecting`] right away while the session is
    /// being replaced; callers should retry after a short pause.
    pub async fn accept(&self) -> Result<StreamOf<C, M>> {
        if self.is_closed() {
            return Err(Error::ClientClosed);
        }

        let (session, generation) = {
            let inner = self.shared.inner.lock().await;
            match (&inner.state, &inner.session) {
                (ClientState::Running, Some(session)) => (Arc::clone(session), inner.generation),
                _ => return Err(inner.accept_err.clone().unwrap_or(Error::ClientReconnecting)),
            }
        };

        let result = tokio::select! {
            result = session.accept() => result,
            _ = wait_closed(self.shared.closed.subscribe()) => return Err(Error::ClientClosed),
        };

        match result {
            Ok(stream) => Ok(stream),
            Err(e) => Err(Shared::session_failed(&self.shared, generation, e).await),
        }
    }

    /// Idempotent; only the first call closes the session.
    pub async fn close(&self) -> Result<()> {
        if self.shared.closed.send_replace(true) {
            return Ok(());
        }

        let session = {
            let mut inner = self.shared.inner.lock().await;
            inner.state = ClientState::Closed;
            inner.accept_err = Some(Error::ClientClosed);
            inner.session.take()
        };

        if let Some(session) = session {
            if let Err(e) = session.close().await {
                warn!(error = %e, "error closing session");
            }
        }

        info!("tunnel client closed");
        Ok(())
    }

    /// Local address of the current session; not meaningful to viewers.
    pub async fn address(&self) -> SessionAddr {
        self.shared.inner.lock().await.addr.clone()
    }

    pub async fn state(&self) -> ClientState {
        self.shared.inner.lock().await.state
    }

    /// Retries a reconnection after a background attempt gave up.
    ///
    /// A no-op while running. Fails with [`Error::ClientReconnecting`] while
    /// another reconnection is in flight. The reconnection runs on its own
    /// task, so dropping this future does not abandon it.
    pub async fn reconnect(&self) -> Result<()> {
        {
            let mut inner = self.shared.inner.lock().await;
            match inner.state {
                ClientState::Closed => return Err(Error::ClientClosed),
                ClientState::Running => return Ok(()),
                ClientState::Broken if inner.reconnecting => return Err(Error::ClientReconnecting),
                ClientState::Broken => {
                    inner.reconnecting = true;
                    inner.accept_err = Some(Error::ClientReconnecting);
                }
            }
        }

        let shared = Arc::clone(&self.shared);
        match tokio::spawn(shared.reconnect()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "reconnect task failed");
                Err(Error::RetryFailed)
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

impl<C, M> Shared<C, M>
where
    C: Connector,
    M: Multiplexer<C::Conn>,
{
    /// Records a failed session accept. Only the caller that moves the client
    /// from running to broken launches the reconnection.
    async fn session_failed(this: &Arc<Self>, generation: u64, cause: std::io::Error) -> Error {
        let mut inner = this.inner.lock().await;

        if inner.state == ClientState::Closed {
            return Error::ClientClosed;
        }
        if inner.state != ClientState::Running || inner.generation != generation {
            return inner.accept_err.clone().unwrap_or(Error::ClientReconnecting);
        }

        warn!(error = %cause, "tunnel session failed, reconnecting");
        inner.state = ClientState::Broken;
        inner.accept_err = Some(Error::ClientReconnecting);
        inner.reconnecting = true;

        let shared = Arc::clone(this);
        tokio::spawn(async move {
            let _ = shared.reconnect().await;
        });

        Error::ClientReconnecting
    }

    async fn reconnect(self: Arc<Self>) -> Result<()> {
        let outcome = self.reconnector.connect_with_retry().await;

        let mut inner = self.inner.lock().await;
        inner.reconnecting = false;

        if inner.state == ClientState::Closed {
            debug!("client closed during reconnection, dropping new connection");
            return Err(Error::ClientClosed);
        }

        let Dialed { conn, url } = match outcome {
            Ok(dialed) => dialed,
            Err(e) => {
                let sticky = e.into_sticky();
                error!(error = %sticky, "unable to reconnect to relay");
                inner.accept_err = Some(sticky.clone());
                return Err(sticky);
            }
        };

        if let Some(old) = inner.session.take() {
            let _ = old.close().await;
        }

        let session = self.multiplexer.client(conn, &self.session_config);
        inner.addr = session.local_addr();
        inner.session = Some(Arc::new(session));
        inner.generation += 1;
        let url: Arc<str> = Arc::from(url);
        self.url.send_replace(Arc::clone(&url));
        inner.accept_err = None;
        inner.state = ClientState::Running;

        info!(url = %url, "tunnel client running");
        Ok(())
    }
}
