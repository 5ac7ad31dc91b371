// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client Configuration
//!
//! Settings for a [`ConnectionManager`](crate::network::ConnectionManager),
//! built in code, deserialized, or read from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::{BackoffStrategy, TransportConfig};

/// Environment variable holding the server URL.
pub const ENV_URL: &str = "COURIER_URL";
/// Environment variable holding the reconnect delay in milliseconds.
pub const ENV_RECONNECT_DELAY_MS: &str = "COURIER_RECONNECT_DELAY_MS";
/// Environment variable holding comma separated initial channels.
pub const ENV_CHANNELS: &str = "COURIER_CHANNELS";
/// Environment variable bounding the outbound queue.
pub const ENV_MAX_QUEUED: &str = "COURIER_MAX_QUEUED";

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Server address is required")]
    MissingAddress,

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Configuration for the connection manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server URL (`ws://` or `wss://`).
    pub address: String,
    /// Base delay between a close and the next connection attempt.
    pub reconnect_delay_ms: u64,
    /// How the delay grows across consecutive failures.
    pub backoff: BackoffStrategy,
    /// Channels subscribed at construction, in order.
    pub initial_channels: Vec<String>,
    /// Outbound queue bound; `None` keeps everything (drop-oldest otherwise).
    pub max_queued_messages: Option<usize>,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Longest a single poll waits for inbound data, in milliseconds.
    pub io_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: String::new(),
            reconnect_delay_ms: 2_000,
            backoff: BackoffStrategy::Fixed,
            initial_channels: Vec::new(),
            max_queued_messages: None,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 50,
        }
    }
}

impl ClientConfig {
    /// Creates a config with default settings for `address`.
    pub fn new(address: &str) -> Self {
        ClientConfig {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// Creates a builder for `address`.
    pub fn builder(address: &str) -> ClientConfigBuilder {
        ClientConfigBuilder::new(address)
    }

    /// Base reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Settings handed to the connector for each attempt.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            server_url: self.address.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            io_timeout_ms: self.io_timeout_ms,
        }
    }

    /// Checks that the address is present and uses a WebSocket scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::MissingAddress);
        }
        if !(self.address.starts_with("ws://") || self.address.starts_with("wss://")) {
            return Err(ConfigError::InvalidAddress(self.address.clone()));
        }
        if self.max_queued_messages == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_queued_messages".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Reads the configuration from `COURIER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, using the same keys as
    /// [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = lookup(ENV_URL).ok_or(ConfigError::MissingAddress)?;
        let mut builder = ClientConfigBuilder::new(&address);

        if let Some(value) = lookup(ENV_RECONNECT_DELAY_MS) {
            builder = builder.reconnect_delay_ms(parse_number(ENV_RECONNECT_DELAY_MS, &value)?);
        }
        if let Some(value) = lookup(ENV_CHANNELS) {
            builder = builder.channels(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|channel| !channel.is_empty()),
            );
        }
        if let Some(value) = lookup(ENV_MAX_QUEUED) {
            let max: u64 = parse_number(ENV_MAX_QUEUED, &value)?;
            let max = usize::try_from(max).map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_QUEUED.into(),
                value: value.clone(),
            })?;
            builder = builder.max_queued_messages(max);
        }

        builder.build()
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder
    pub fn new(address: &str) -> Self {
        ClientConfigBuilder {
            config: ClientConfig::new(address),
        }
    }

    /// Set the base reconnect delay
    pub fn reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the backoff strategy
    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Add an initial channel (duplicates are ignored by the registry)
    pub fn channel(mut self, channel: &str) -> Self {
        self.config.initial_channels.push(channel.to_string());
        self
    }

    /// Add several initial channels
    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .initial_channels
            .extend(channels.into_iter().map(Into::into));
        self
    }

    /// Bound the outbound queue
    pub fn max_queued_messages(mut self, max: usize) -> Self {
        self.config.max_queued_messages = Some(max);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-poll read timeout
    pub fn io_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.io_timeout_ms = timeout_ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
