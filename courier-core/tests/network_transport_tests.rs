//! Tests for network::transport
//! Extracted from transport.rs

use courier_core::network::*;

#[test]
fn test_transport_config_defaults() {
    let config = TransportConfig::default();

    assert!(config.server_url.is_empty());
    assert_eq!(config.connect_timeout_ms, 10_000);
    assert_eq!(config.io_timeout_ms, 50);
}

#[test]
fn test_connection_state_values() {
    assert_ne!(ConnectionState::Connecting, ConnectionState::Open);
    assert_ne!(ConnectionState::Open, ConnectionState::Closed);
    assert_eq!(ConnectionState::Closed, ConnectionState::Closed);
}

#[test]
fn test_transport_event_equality() {
    assert_eq!(
        TransportEvent::Message("x".into()),
        TransportEvent::Message("x".into())
    );
    assert_ne!(TransportEvent::Opened, TransportEvent::Closed);
}
