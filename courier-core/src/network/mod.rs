//! Network Layer
//!
//! Resilient client side of a single persistent message channel.
//!
//! # Architecture
//!
//! The network layer consists of:
//! - **Transport trait**: Platform-agnostic duplex connection, opened per attempt by a `Connector`
//! - **Message types**: JSON wire messages with a `type` and a `channel`
//! - **Outbound queue**: FIFO buffer for messages sent while disconnected
//! - **Subscription registry**: Channels replayed to the server on every open
//! - **Dispatcher**: Routes inbound messages to handlers by kind
//! - **Connection manager**: Reconnect loop tying the pieces together
//!
//! # Example
//!
//! ```ignore
//! use courier_core::config::ClientConfig;
//! use courier_core::network::{ConnectionManager, Message, MockConnector};
//!
//! // Create a client with a mock connector (for testing)
//! let connector = MockConnector::new().with_auto_open();
//! let config = ClientConfig::builder("ws://localhost:9000/ws").channel("broadcast").build()?;
//! let mut client = ConnectionManager::new(connector, config);
//!
//! client.add_handler("pong", |msg, _ctx| println!("{:?}", msg));
//! client.send(Message::new("ping", "broadcast"));
//! client.start();
//! client.poll();
//! ```

#[cfg(feature = "testing")]
pub mod backoff;
#[cfg(not(feature = "testing"))]
mod backoff;

#[cfg(feature = "testing")]
pub mod connection;
#[cfg(not(feature = "testing"))]
mod connection;

#[cfg(feature = "testing")]
pub mod dispatch;
#[cfg(not(feature = "testing"))]
mod dispatch;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod message;
#[cfg(not(feature = "testing"))]
mod message;

#[cfg(feature = "testing")]
pub mod mock;
#[cfg(not(feature = "testing"))]
mod mock;

#[cfg(feature = "testing")]
pub mod queue;
#[cfg(not(feature = "testing"))]
mod queue;

#[cfg(feature = "testing")]
pub mod subscriptions;
#[cfg(not(feature = "testing"))]
mod subscriptions;

#[cfg(feature = "testing")]
pub mod transport;
#[cfg(not(feature = "testing"))]
mod transport;

#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
#[cfg(feature = "testing")]
pub mod websocket;
#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
#[cfg(not(feature = "testing"))]
mod websocket;

// Error types
pub use error::NetworkError;

// Message types
pub use message::{Message, SUBSCRIBE_KIND};

// Transport abstraction
pub use transport::{
    ConnectionState, Connector, Transport, TransportConfig, TransportEvent, TransportResult,
};

// Mock transport for testing
pub use mock::{MockConnector, MockLink, MockTransport};

// WebSocket transport for production
#[cfg(any(feature = "network-native-tls", feature = "network-rustls"))]
pub use websocket::{WebSocketConnector, WebSocketTransport};

// Building blocks
pub use backoff::BackoffStrategy;
pub use dispatch::{DispatchOutcome, Dispatcher, HandlerAction, HandlerContext, MessageHandler};
pub use queue::OutboundQueue;
pub use subscriptions::SubscriptionRegistry;

// Connection management
pub use connection::{ConnectionManager, ConnectionStats};
