// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Transport
//!
//! In-memory connector and transport for tests. The connector is a cheap
//! handle: keep a clone, give the other to the connection manager, then
//! drive each connection through its [`MockLink`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::NetworkError;
use super::message::Message;
use super::transport::{Connector, Transport, TransportConfig, TransportEvent, TransportResult};

#[derive(Debug, Default)]
struct LinkState {
    address: String,
    events: VecDeque<TransportEvent>,
    sent: Vec<String>,
    open: bool,
    closed_reported: bool,
    fail_sends: bool,
}

/// Test-side handle to one mock connection.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    /// Address the connection was opened with.
    pub fn address(&self) -> String {
        self.state.lock().address.clone()
    }

    /// Queues an `Opened` event.
    pub fn emit_open(&self) {
        let mut state = self.state.lock();
        if !state.closed_reported {
            state.events.push_back(TransportEvent::Opened);
        }
    }

    /// Queues an inbound payload.
    pub fn emit_message(&self, raw: impl Into<String>) {
        self.state
            .lock()
            .events
            .push_back(TransportEvent::Message(raw.into()));
    }

    /// Queues an error without closing the connection.
    pub fn emit_error(&self, info: impl Into<String>) {
        self.state
            .lock()
            .events
            .push_back(TransportEvent::Error(info.into()));
    }

    /// Simulates the remote end dropping the connection.
    pub fn emit_close(&self) {
        let mut state = self.state.lock();
        state.open = false;
        if !state.closed_reported {
            state.closed_reported = true;
            state.events.push_back(TransportEvent::Closed);
        }
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    /// Raw payloads sent on this connection, in order.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Sent payloads decoded back into messages.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent()
            .iter()
            .filter_map(|raw| Message::decode(raw).ok())
            .collect()
    }

    /// Returns true once `Closed` has been reported or queued.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed_reported
    }

    /// Number of events not yet consumed by the transport owner.
    pub fn pending_events(&self) -> usize {
        self.state.lock().events.len()
    }
}

/// Transport backed by a [`MockLink`].
#[derive(Debug)]
pub struct MockTransport {
    link: MockLink,
}

impl MockTransport {
    /// Creates a transport with a fresh link.
    pub fn new() -> Self {
        MockTransport {
            link: MockLink::default(),
        }
    }

    /// Returns the test-side handle of this transport.
    pub fn link(&self) -> MockLink {
        self.link.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn poll_event(&mut self) -> TransportResult<Option<TransportEvent>> {
        let mut state = self.link.state.lock();
        let event = state.events.pop_front();
        match event {
            Some(TransportEvent::Opened) => state.open = true,
            Some(TransportEvent::Closed) => state.open = false,
            _ => {}
        }
        Ok(event)
    }

    fn send(&mut self, payload: &str) -> TransportResult<()> {
        let mut state = self.link.state.lock();
        if !state.open || state.closed_reported {
            return Err(NetworkError::NotConnected);
        }
        if state.fail_sends {
            return Err(NetworkError::SendFailed("injected failure".into()));
        }
        state.sent.push(payload.to_string());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        let state = self.link.state.lock();
        state.open && !state.closed_reported
    }

    fn close(&mut self) {
        self.link.emit_close();
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    links: Vec<MockLink>,
    auto_open: bool,
    failing_opens: usize,
}

/// Connector producing [`MockTransport`]s and remembering every attempt.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    inner: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    /// Creates a connector whose transports wait for [`MockLink::emit_open`].
    pub fn new() -> Self {
        MockConnector::default()
    }

    /// New transports report `Opened` immediately.
    pub fn with_auto_open(self) -> Self {
        self.inner.lock().auto_open = true;
        self
    }

    /// The next `count` connection attempts fail with `Error` then `Closed`.
    pub fn fail_next_opens(&self, count: usize) {
        self.inner.lock().failing_opens = count;
    }

    /// Number of connection attempts so far.
    pub fn open_count(&self) -> usize {
        self.inner.lock().links.len()
    }

    /// Addresses passed to each connection attempt, oldest first.
    pub fn opened_addresses(&self) -> Vec<String> {
        self.inner.lock().links.iter().map(MockLink::address).collect()
    }

    /// Handle to the `index`-th connection attempt.
    pub fn link(&self, index: usize) -> Option<MockLink> {
        self.inner.lock().links.get(index).cloned()
    }

    /// Handle to the most recent connection attempt.
    pub fn current(&self) -> Option<MockLink> {
        self.inner.lock().links.last().cloned()
    }

    /// Every payload sent across all connections, in order.
    pub fn all_sent(&self) -> Vec<String> {
        self.inner
            .lock()
            .links
            .iter()
            .flat_map(MockLink::sent)
            .collect()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn open(&mut self, config: &TransportConfig) -> MockTransport {
        let transport = MockTransport::new();
        let link = transport.link();
        link.state.lock().address = config.server_url.clone();

        let mut inner = self.inner.lock();
        if inner.failing_opens > 0 {
            inner.failing_opens -= 1;
            link.emit_error("connection refused");
            link.emit_close();
        } else if inner.auto_open {
            link.emit_open();
        }
        inner.links.push(link);

        transport
    }
}
