//! Transport Trait
//!
//! Platform-agnostic abstraction for the duplex connection underneath the
//! connection manager.

use super::error::NetworkError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, NetworkError>;

/// Connection state as seen by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A connection attempt is in progress, or about to start.
    Connecting,
    /// Connected and ready.
    Open,
    /// The last connection closed; a new attempt is scheduled unless stopped.
    Closed,
}

/// Events a transport reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and `send` may be used.
    Opened,
    /// A text payload arrived.
    Message(String),
    /// Something went wrong. The connection may still be open.
    Error(String),
    /// The connection is gone. Reported exactly once per transport.
    Closed,
}

/// Configuration handed to a [`Connector`] for each connection attempt.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Server URL.
    pub server_url: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds; bounds how long one poll may wait.
    pub io_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            server_url: String::new(),
            connect_timeout_ms: 10_000,
            io_timeout_ms: 50,
        }
    }
}

/// One connection to the server.
///
/// A transport lives for exactly one connection: once it has reported
/// [`TransportEvent::Closed`] it is dropped and a fresh one is opened through
/// the [`Connector`]. Events are pulled with [`Transport::poll_event`], so the
/// owner decides when handlers run.
///
/// # Example
///
/// ```ignore
/// use courier_core::network::{Connector, MockConnector, Transport, TransportConfig};
///
/// let mut connector = MockConnector::new().with_auto_open();
/// let mut transport = connector.open(&TransportConfig::default());
/// assert_eq!(transport.poll_event()?, Some(TransportEvent::Opened));
/// transport.send(r#"{"type":"ping","channel":"broadcast"}"#)?;
/// ```
pub trait Transport: Send {
    /// Returns the next pending event, or `Ok(None)` if nothing happened
    /// within the configured I/O timeout.
    ///
    /// An `Err` is treated by the caller like [`TransportEvent::Error`].
    fn poll_event(&mut self) -> TransportResult<Option<TransportEvent>>;

    /// Sends a text payload.
    ///
    /// Only valid while [`Transport::is_ready`] returns true; otherwise
    /// returns [`NetworkError::NotConnected`].
    fn send(&mut self, payload: &str) -> TransportResult<()>;

    /// Returns true if the connection is open and `send` may be used.
    fn is_ready(&self) -> bool;

    /// Closes the connection.
    ///
    /// Queues a [`TransportEvent::Closed`] unless one was already reported.
    /// Safe to call repeatedly.
    fn close(&mut self);
}

/// Opens transports. Called once per connection attempt.
pub trait Connector: Send {
    /// Transport type produced by this connector.
    type Transport: Transport;

    /// Starts a connection attempt.
    ///
    /// Never fails directly: an attempt that cannot be established yields a
    /// transport whose first events are `Error` and `Closed`.
    fn open(&mut self, config: &TransportConfig) -> Self::Transport;
}
