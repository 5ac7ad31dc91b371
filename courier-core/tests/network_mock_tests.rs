// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for network::mock
//! Extracted from mock.rs

use courier_core::network::*;

fn create_test_config() -> TransportConfig {
    TransportConfig {
        server_url: "ws://test.local/ws".into(),
        ..Default::default()
    }
}

#[test]
fn test_mock_transport_open_close() {
    let mut connector = MockConnector::new();
    let mut transport = connector.open(&create_test_config());
    let link = connector.current().unwrap();

    assert!(!transport.is_ready());
    assert_eq!(transport.poll_event().unwrap(), None);

    link.emit_open();
    assert_eq!(transport.poll_event().unwrap(), Some(TransportEvent::Opened));
    assert!(transport.is_ready());

    transport.close();
    assert!(!transport.is_ready());
    assert_eq!(transport.poll_event().unwrap(), Some(TransportEvent::Closed));
}

#[test]
fn test_mock_transport_reports_closed_once() {
    let mut transport = MockTransport::new();
    let link = transport.link();

    link.emit_close();
    transport.close();
    link.emit_close();

    assert_eq!(transport.poll_event().unwrap(), Some(TransportEvent::Closed));
    assert_eq!(transport.poll_event().unwrap(), None);
}

#[test]
fn test_mock_transport_send_tracks_payloads() {
    let mut connector = MockConnector::new().with_auto_open();
    let mut transport = connector.open(&create_test_config());
    transport.poll_event().unwrap();

    transport.send(r#"{"type":"a","channel":"x"}"#).unwrap();
    transport.send(r#"{"type":"b","channel":"x"}"#).unwrap();

    let link = connector.current().unwrap();
    assert_eq!(link.sent().len(), 2);
    let kinds: Vec<_> = link.sent_messages().into_iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec!["a", "b"]);
}

#[test]
fn test_mock_transport_not_connected_error() {
    let mut transport = MockTransport::new();

    let result = transport.send("{}");
    assert!(matches!(result, Err(NetworkError::NotConnected)));
}

#[test]
fn test_mock_transport_error_injection() {
    let mut transport = MockTransport::new();
    let link = transport.link();
    link.emit_open();
    transport.poll_event().unwrap();

    link.fail_sends(true);
    let result = transport.send("{}");
    assert!(matches!(result, Err(NetworkError::SendFailed(_))));

    link.fail_sends(false);
    assert!(transport.send("{}").is_ok());
}

#[test]
fn test_mock_transport_events_in_order() {
    let mut transport = MockTransport::new();
    let link = transport.link();

    link.emit_open();
    link.emit_message("one");
    link.emit_error("oops");
    link.emit_message("two");
    assert_eq!(link.pending_events(), 4);

    assert_eq!(transport.poll_event().unwrap(), Some(TransportEvent::Opened));
    assert_eq!(
        transport.poll_event().unwrap(),
        Some(TransportEvent::Message("one".into()))
    );
    assert_eq!(
        transport.poll_event().unwrap(),
        Some(TransportEvent::Error("oops".into()))
    );
    assert_eq!(
        transport.poll_event().unwrap(),
        Some(TransportEvent::Message("two".into()))
    );
    assert_eq!(link.pending_events(), 0);
}

#[test]
fn test_mock_connector_records_attempts() {
    let mut connector = MockConnector::new();
    let handle = connector.clone();

    connector.open(&create_test_config());
    connector.open(&TransportConfig {
        server_url: "ws://other.local".into(),
        ..Default::default()
    });

    assert_eq!(handle.open_count(), 2);
    assert_eq!(
        handle.opened_addresses(),
        vec!["ws://test.local/ws".to_string(), "ws://other.local".to_string()]
    );
    assert_eq!(handle.link(1).unwrap().address(), "ws://other.local");
    assert!(handle.link(2).is_none());
}

#[test]
fn test_mock_connector_failing_opens() {
    let mut connector = MockConnector::new().with_auto_open();
    connector.fail_next_opens(1);

    let mut failed = connector.open(&create_test_config());
    assert!(matches!(
        failed.poll_event().unwrap(),
        Some(TransportEvent::Error(_))
    ));
    assert_eq!(failed.poll_event().unwrap(), Some(TransportEvent::Closed));

    let mut healthy = connector.open(&create_test_config());
    assert_eq!(healthy.poll_event().unwrap(), Some(TransportEvent::Opened));
}
