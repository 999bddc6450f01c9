// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use std::time::Duration;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(180);
const DEFAULT_MULTIPLIER: f64 = 1.5;

/// Retry parameters for one connection attempt sequence.
///
/// Zero (or non-finite) fields mean "use the default"; see
/// [`RetryConfig::with_defaults`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_elapsed_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            max_elapsed_time: DEFAULT_MAX_ELAPSED_TIME,
        }
    }
}

impl RetryConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.initial_delay.is_zero() {
            self.initial_delay = DEFAULT_INITIAL_DELAY;
        }
        if self.max_delay.is_zero() {
            self.max_delay = DEFAULT_MAX_DELAY;
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            self.multiplier = DEFAULT_MULTIPLIER;
        }
        if self.max_elapsed_time.is_zero() {
            self.max_elapsed_time = DEFAULT_MAX_ELAPSED_TIME;
        }
        self
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(*self)
    }
}

/// Computes successive retry delays.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        let config = config.with_defaults();
        Self {
            initial_delay: config.initial_delay,
            max_delay: config.max_delay.max(config.initial_delay),
            multiplier: config.multiplier,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Never shorter than `current`, never longer than the cap (unless
    /// `current` itself already exceeds it).
    pub fn next_delay(&self, current: Duration) -> Duration {
        if current >= self.max_delay {
            return current;
        }
        let scaled = (current.as_nanos() as f64 * self.multiplier).round();
        let next = if scaled >= self.max_delay.as_nanos() as f64 {
            self.max_delay
        } else {
            Duration::from_nanos(scaled as u64)
        };
        next.clamp(current, self.max_delay)
    }
}
