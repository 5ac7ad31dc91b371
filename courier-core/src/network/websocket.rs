// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! WebSocket Transport
//!
//! Real transport implementation using tungstenite for WebSocket connections.
//! Supports both native-tls and rustls TLS backends.

use std::collections::VecDeque;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

#[cfg(all(feature = "network-native-tls", not(feature = "network-rustls")))]
use native_tls::TlsConnector;

#[cfg(feature = "network-rustls")]
use rustls::pki_types::ServerName;
#[cfg(feature = "network-rustls")]
use std::sync::Arc;

use tracing::{debug, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message as WsMessage, WebSocket};

use super::error::NetworkError;
use super::transport::{Connector, Transport, TransportConfig, TransportEvent, TransportResult};

/// Opens a [`WebSocketTransport`] per connection attempt.
///
/// # Example
///
/// ```ignore
/// use courier_core::network::{ConnectionManager, WebSocketConnector};
///
/// let mut client = ConnectionManager::new(WebSocketConnector::new(), config);
/// client.start();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a new connector.
    pub fn new() -> Self {
        WebSocketConnector
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    fn open(&mut self, config: &TransportConfig) -> WebSocketTransport {
        WebSocketTransport::connect(config)
    }
}

/// WebSocket transport carrying JSON text frames.
///
/// Supports both ws:// (plaintext) and wss:// (TLS) connections. The
/// handshake is performed synchronously in [`WebSocketTransport::connect`];
/// afterwards reads wait at most `io_timeout_ms` per poll.
pub struct WebSocketTransport {
    socket: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
    events: VecDeque<TransportEvent>,
    closed_reported: bool,
}

impl WebSocketTransport {
    /// Connects to `config.server_url`.
    ///
    /// On success the first event is `Opened`; on failure the transport
    /// reports `Error` followed by `Closed`.
    pub fn connect(config: &TransportConfig) -> Self {
        let mut transport = WebSocketTransport {
            socket: None,
            events: VecDeque::new(),
            closed_reported: false,
        };

        match Self::establish(config) {
            Ok(socket) => {
                transport.socket = Some(socket);
                transport.events.push_back(TransportEvent::Opened);
            }
            Err(e) => {
                transport.events.push_back(TransportEvent::Error(e.to_string()));
                transport.events.push_back(TransportEvent::Closed);
                transport.closed_reported = true;
            }
        }

        transport
    }

    fn establish(
        config: &TransportConfig,
    ) -> TransportResult<WebSocket<MaybeTlsStream<TcpStream>>> {
        let (host, port, is_tls) = Self::parse_url(&config.server_url)?;
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);

        let addrs = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        let mut last_error = NetworkError::ConnectionFailed(format!("No address for {}", host));
        let mut tcp_stream = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    tcp_stream = Some(stream);
                    break;
                }
                Err(e) => last_error = NetworkError::ConnectionFailed(e.to_string()),
            }
        }
        let tcp_stream = tcp_stream.ok_or(last_error)?;

        // The handshake gets the connect timeout; polling switches to the I/O timeout.
        let timeouts = tcp_stream
            .try_clone()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        timeouts
            .set_read_timeout(Some(connect_timeout))
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;
        timeouts
            .set_write_timeout(Some(connect_timeout))
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        // Wrap in TLS if needed
        let stream: MaybeTlsStream<TcpStream> = if is_tls {
            Self::create_tls_stream(&host, tcp_stream)?
        } else {
            MaybeTlsStream::Plain(tcp_stream)
        };

        // WebSocket handshake - use IntoClientRequest for proper HTTP/1.1 request
        let request = config
            .server_url
            .as_str()
            .into_client_request()
            .map_err(|e| {
                NetworkError::ConnectionFailed(format!("Invalid WebSocket request: {}", e))
            })?;

        let (socket, _response) = tungstenite::client(request, stream).map_err(|e| {
            NetworkError::ConnectionFailed(format!("WebSocket handshake failed: {}", e))
        })?;

        timeouts
            .set_read_timeout(Some(Duration::from_millis(config.io_timeout_ms.max(1))))
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        debug!(url = %config.server_url, "websocket handshake complete");
        Ok(socket)
    }

    /// Parses a WebSocket URL into host and port.
    fn parse_url(url: &str) -> Result<(String, u16, bool), NetworkError> {
        let is_tls = url.starts_with("wss://");
        let url_without_scheme = url
            .strip_prefix("wss://")
            .or_else(|| url.strip_prefix("ws://"))
            .ok_or_else(|| {
                NetworkError::ConnectionFailed(
                    "Invalid URL scheme (expected ws:// or wss://)".into(),
                )
            })?;

        // Split host:port/path
        let host_port = url_without_scheme
            .split('/')
            .next()
            .unwrap_or(url_without_scheme);

        let (host, port) = if let Some(colon_pos) = host_port.rfind(':') {
            let host = &host_port[..colon_pos];
            let port_str = &host_port[colon_pos + 1..];
            let port: u16 = port_str.parse().map_err(|_| {
                NetworkError::ConnectionFailed(format!("Invalid port: {}", port_str))
            })?;
            (host.to_string(), port)
        } else {
            let default_port = if is_tls { 443 } else { 80 };
            (host_port.to_string(), default_port)
        };

        Ok((host, port, is_tls))
    }

    /// Create a TLS stream using native-tls
    #[cfg(all(feature = "network-native-tls", not(feature = "network-rustls")))]
    fn create_tls_stream(
        host: &str,
        tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, NetworkError> {
        let connector = TlsConnector::new()
            .map_err(|e| NetworkError::ConnectionFailed(format!("TLS error: {}", e)))?;
        let tls_stream = connector
            .connect(host, tcp_stream)
            .map_err(|e| NetworkError::ConnectionFailed(format!("TLS handshake failed: {}", e)))?;
        Ok(MaybeTlsStream::NativeTls(tls_stream))
    }

    /// Create a TLS stream using rustls
    #[cfg(feature = "network-rustls")]
    fn create_tls_stream(
        host: &str,
        tcp_stream: TcpStream,
    ) -> Result<MaybeTlsStream<TcpStream>, NetworkError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let server_name: ServerName<'_> = host.try_into().map_err(|_| {
            NetworkError::ConnectionFailed(format!("Invalid server name: {}", host))
        })?;

        let tls_conn = rustls::ClientConnection::new(Arc::new(config), server_name.to_owned())
            .map_err(|e| NetworkError::ConnectionFailed(format!("TLS setup failed: {}", e)))?;

        Ok(MaybeTlsStream::Rustls(rustls::StreamOwned::new(
            tls_conn, tcp_stream,
        )))
    }

    /// Drops the socket and reports `Closed` once.
    fn shutdown(&mut self) -> TransportEvent {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None); // Ignore errors on close
            let _ = socket.flush();
        }
        self.closed_reported = true;
        TransportEvent::Closed
    }
}

impl Transport for WebSocketTransport {
    fn poll_event(&mut self) -> TransportResult<Option<TransportEvent>> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }

        let Some(socket) = self.socket.as_mut() else {
            return Ok(None);
        };

        match socket.read() {
            Ok(WsMessage::Text(text)) => Ok(Some(TransportEvent::Message(text))),
            Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => Ok(Some(TransportEvent::Message(text))),
                Err(e) => {
                    warn!(len = e.as_bytes().len(), "dropping binary frame that is not UTF-8");
                    Ok(None)
                }
            },
            // tungstenite queues the pong reply itself during read()
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => Ok(None),
            Ok(WsMessage::Close(_)) => Ok(Some(self.shutdown())),
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                // No message available (timeout)
                Ok(None)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(Some(self.shutdown()))
            }
            Err(e) => Err(NetworkError::ReceiveFailed(e.to_string())),
        }
    }

    fn send(&mut self, payload: &str) -> TransportResult<()> {
        let socket = self.socket.as_mut().ok_or(NetworkError::NotConnected)?;

        socket
            .send(WsMessage::Text(payload.to_string()))
            .map_err(|e| match e {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                    NetworkError::ConnectionClosed
                }
                e => NetworkError::SendFailed(e.to_string()),
            })
    }

    fn is_ready(&self) -> bool {
        self.socket.is_some() && !self.closed_reported
    }

    fn close(&mut self) {
        if self.closed_reported {
            return;
        }
        let event = self.shutdown();
        self.events.push_back(event);
    }
}

// INLINE_TEST_REQUIRED: Tests private parse_url function for URL parsing logic
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_wss() {
        let (host, port, is_tls) =
            WebSocketTransport::parse_url("wss://courier.example.com").unwrap();
        assert_eq!(host, "courier.example.com");
        assert_eq!(port, 443);
        assert!(is_tls);
    }

    #[test]
    fn test_parse_url_ws_with_path() {
        let (host, port, is_tls) = WebSocketTransport::parse_url("ws://localhost:9000/ws").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 9000);
        assert!(!is_tls);
    }

    #[test]
    fn test_parse_url_invalid_scheme() {
        assert!(WebSocketTransport::parse_url("http://example.com").is_err());
    }

    #[test]
    fn test_parse_url_invalid_port() {
        assert!(WebSocketTransport::parse_url("ws://localhost:notaport").is_err());
    }

    #[test]
    fn test_failed_connect_reports_error_then_closed() {
        let config = TransportConfig {
            server_url: "http://example.com".into(),
            ..Default::default()
        };
        let mut transport = WebSocketConnector::new().open(&config);

        assert!(!transport.is_ready());
        assert!(matches!(
            transport.poll_event().unwrap(),
            Some(TransportEvent::Error(_))
        ));
        assert_eq!(transport.poll_event().unwrap(), Some(TransportEvent::Closed));
        assert_eq!(transport.poll_event().unwrap(), None);

        // Closing again must not report a second Closed
        transport.close();
        assert_eq!(transport.poll_event().unwrap(), None);
    }

    #[test]
    fn test_non_utf8_binary_frame_is_dropped() {
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();
            socket.send(WsMessage::Binary(vec![0xff, 0xfe])).unwrap();
            socket.send(WsMessage::Ping(vec![1])).unwrap();
            socket
                .send(WsMessage::Text(r#"{"type":"pong"}"#.into()))
                .unwrap();
            // Until the client hangs up
            while socket.read().is_ok() {}
        });

        let config = TransportConfig {
            server_url: format!("ws://127.0.0.1:{}/ws", port),
            ..Default::default()
        };
        let mut transport = WebSocketTransport::connect(&config);
        assert_eq!(transport.poll_event().unwrap(), Some(TransportEvent::Opened));

        let mut received = Vec::new();
        for _ in 0..100 {
            if let Some(event) = transport.poll_event().unwrap() {
                let done = matches!(event, TransportEvent::Message(_));
                received.push(event);
                if done {
                    break;
                }
            }
        }

        assert_eq!(
            received,
            vec![TransportEvent::Message(r#"{"type":"pong"}"#.into())]
        );
        assert!(transport.is_ready());

        transport.close();
        server.join().unwrap();
    }

    #[test]
    fn test_send_on_failed_transport_fails() {
        let config = TransportConfig {
            server_url: "http://example.com".into(),
            ..Default::default()
        };
        let mut transport = WebSocketTransport::connect(&config);
        assert!(matches!(
            transport.send("{}"),
            Err(NetworkError::NotConnected)
        ));
    }
}
