// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::config::{Config, Configurer};
use crate::connection::{Connector, DialError, DialRequest, Dialed};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, error, info, warn};
use websocktunnel_core::{token, Error, Result};

/// Drives dial attempts against the relay until one succeeds, one fails
/// fatally, or the retry window closes.
///
/// Holds the current [`Config`]. Runs are serialised on it, so a credential
/// refresh is never interleaved with another run's dialing.
pub struct Reconnector<C: Connector> {
    configurer: Arc<dyn Configurer>,
    connector: C,
    config: Mutex<Config>,
}

impl<C: Connector> Reconnector<C> {
    /// Obtains the initial configuration; does not dial.
    pub async fn new(configurer: Arc<dyn Configurer>, connector: C) -> Result<Self> {
        let config = fetch_config(configurer.as_ref()).await?;
        Ok(Self {
            configurer,
            connector,
            config: Mutex::new(config),
        })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub async fn config(&self) -> Config {
        self.config.lock().await.clone()
    }

    pub async fn connect_with_retry(&self) -> Result<Dialed<C::Conn>> {
        let mut config = self.config.lock().await;

        if !token::is_token_usable(&config.token) {
            debug!(client_id = %config.id, "bearer token is not usable, refreshing configuration");
            *config = fetch_config(self.configurer.as_ref()).await?;
        }

        let request = DialRequest::from_config(&config)?;
        let backoff = config.retry.backoff();
        let started = Instant::now();
        let deadline = started + config.retry.max_elapsed_time;
        let mut delay = backoff.initial_delay();
        let mut next_attempt = started + delay;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(client_id = %request.id, relay = %request.url, attempt, "trying to connect");

            let outcome = match timeout_at(deadline, self.connector.dial(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(relay = %request.url, attempt, "dial still pending at retry deadline");
                    return Err(Error::RetryTimedOut);
                }
            };

            match outcome {
                Ok(dialed) => {
                    info!(
                        client_id = %request.id,
                        relay = %request.url,
                        attempt,
                        url = %dialed.url,
                        "connected to relay"
                    );
                    return Ok(dialed);
                }
                Err(DialError::Unauthorized) => {
                    error!(client_id = %request.id, relay = %request.url, "relay rejected credentials");
                    return Err(Error::AuthFailed);
                }
                Err(DialError::Rejected(reason)) => {
                    error!(relay = %request.url, %reason, "could not connect to relay");
                    return Err(Error::RetryFailed);
                }
                Err(DialError::Transient(reason)) => {
                    if attempt > 1 {
                        delay = backoff.next_delay(delay);
                        next_attempt = Instant::now() + delay;
                    }
                    warn!(
                        relay = %request.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "connection failed, retrying"
                    );
                }
            }

            tokio::select! {
                biased;
                _ = sleep_until(deadline) => {
                    warn!(relay = %request.url, attempt, "giving up, retry window elapsed");
                    return Err(Error::RetryTimedOut);
                }
                _ = sleep_until(next_attempt) => {}
            }
        }
    }
}

async fn fetch_config(configurer: &dyn Configurer) -> Result<Config> {
    let mut config = configurer
        .configure()
        .await
        .map_err(|e| Error::Configuration(format!("{:#}", e)))?;
    config.retry = config.retry.with_defaults();
    Ok(config)
}
