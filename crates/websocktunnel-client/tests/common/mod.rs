// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use websocktunnel_client::{
    ClientState, Config, Connector, DialError, DialRequest, Dialed, Multiplexer, RetryConfig,
    Session, SessionAddr, SessionConfig, TunnelClient,
};
use websocktunnel_core::token::{self, Claims};

pub const RELAY: &str = "https://relay.test";

/// What the scripted connector does on one dial.
pub enum Step {
    Succeed(&'static str),
    Transient,
    Unauthorized,
    Rejected,
    /// Waits for the notify, then succeeds.
    Gated(Arc<Notify>, &'static str),
    /// Never completes.
    Hang,
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    steps: Arc<Mutex<VecDeque<Step>>>,
    dials: Arc<Mutex<Vec<(Instant, DialRequest)>>>,
}

impl ScriptedConnector {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            dials: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn dial_count(&self) -> usize {
        self.dials.lock().unwrap().len()
    }

    pub fn dial_times(&self) -> Vec<Instant> {
        self.dials.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn last_request(&self) -> Option<DialRequest> {
        self.dials.lock().unwrap().last().map(|(_, r)| r.clone())
    }
}

#[derive(Debug)]
pub struct MockConn {
    pub url: String,
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Conn = MockConn;

    async fn dial(&self, request: &DialRequest) -> Result<Dialed<MockConn>, DialError> {
        self.dials
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));

        // Scripts that run dry keep failing transiently.
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Transient);
        let url = match step {
            Step::Succeed(url) => url,
            Step::Transient => return Err(DialError::Transient("connection refused".to_string())),
            Step::Unauthorized => return Err(DialError::Unauthorized),
            Step::Rejected => return Err(DialError::Rejected("status 403".to_string())),
            Step::Gated(gate, url) => {
                gate.notified().await;
                url
            }
            Step::Hang => std::future::pending().await,
        };

        Ok(Dialed {
            conn: MockConn {
                url: url.to_string(),
            },
            url: url.to_string(),
        })
    }
}

/// Test-side handle to one session created by [`MockMux`].
#[derive(Clone)]
pub struct SessionHandle {
    pub url: String,
    inbound: mpsc::UnboundedSender<io::Result<String>>,
    closes: Arc<AtomicUsize>,
}

impl SessionHandle {
    pub fn offer(&self, stream: &str) {
        let _ = self.inbound.send(Ok(stream.to_string()));
    }

    pub fn fail(&self) {
        let _ = self
            .inbound
            .send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "relay went away")));
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct MockSession {
    url: String,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<io::Result<String>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for MockSession {
    type Stream = String;

    async fn accept(&self) -> io::Result<String> {
        if self.closes.load(Ordering::SeqCst) > 0 {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "session closed"));
        }
        match self.inbound.lock().await.recv().await {
            Some(result) => result,
            None => Err(io::Error::new(io::ErrorKind::ConnectionAborted, "session dropped")),
        }
    }

    async fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn local_addr(&self) -> SessionAddr {
        SessionAddr::new("mock", self.url.clone())
    }
}

#[derive(Clone, Default)]
pub struct MockMux {
    sessions: Arc<Mutex<Vec<SessionHandle>>>,
}

impl MockMux {
    pub fn session(&self, index: usize) -> SessionHandle {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Multiplexer<MockConn> for MockMux {
    type Session = MockSession;

    fn client(&self, conn: MockConn, _config: &SessionConfig) -> MockSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        self.sessions.lock().unwrap().push(SessionHandle {
            url: conn.url.clone(),
            inbound: tx,
            closes: Arc::clone(&closes),
        });
        MockSession {
            url: conn.url,
            inbound: tokio::sync::Mutex::new(rx),
            closes,
        }
    }
}

pub fn fresh_token() -> String {
    let claims = Claims {
        exp: Some(token::now_unix() + 3600),
        nbf: None,
        sub: Some("test-client".to_string()),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"test-secret-key-for-testing"),
    )
    .unwrap()
}

pub fn retry(initial_ms: u64, max_elapsed_ms: u64) -> RetryConfig {
    RetryConfig {
        initial_delay: Duration::from_millis(initial_ms),
        max_delay: Duration::from_secs(1),
        multiplier: 1.5,
        max_elapsed_time: Duration::from_millis(max_elapsed_ms),
    }
}

/// A configurer handing out usable tokens and counting its invocations.
pub fn counting_configurer(
    token: String,
    retry: RetryConfig,
) -> (
    impl Fn() -> std::future::Ready<anyhow::Result<Config>> + Send + Sync + 'static,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let configurer = move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(Config {
            id: "test-client".to_string(),
            tunnel_addr: RELAY.to_string(),
            token: token.clone(),
            retry,
        }))
    };
    (configurer, calls)
}

pub async fn new_client(
    steps: Vec<Step>,
) -> (TunnelClient<ScriptedConnector, MockMux>, ScriptedConnector, MockMux) {
    let connector = ScriptedConnector::new(steps);
    let mux = MockMux::default();
    let (configurer, _) = counting_configurer(fresh_token(), retry(10, 1_000));
    let client = TunnelClient::new(configurer, connector.clone(), mux.clone())
        .await
        .unwrap();
    (client, connector, mux)
}

pub async fn wait_for_state(
    client: &TunnelClient<ScriptedConnector, MockMux>,
    expected: ClientState,
) {
    for _ in 0..1_000 {
        if client.state().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("client never reached {:?}", expected);
}
