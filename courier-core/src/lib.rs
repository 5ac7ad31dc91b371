//! Courier Core Library
//!
//! Client-side connection manager for a single persistent message channel:
//! reconnects forever, buffers outbound messages while disconnected,
//! replays channel subscriptions on every open and dispatches inbound
//! messages to handlers by kind.

pub mod config;
pub mod network;

pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use network::{
    BackoffStrategy, ConnectionManager, ConnectionState, ConnectionStats, Connector,
    HandlerContext, Message, MockConnector, NetworkError, Transport,
};
#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
pub use network::{WebSocketConnector, WebSocketTransport};
