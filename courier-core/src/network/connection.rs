// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Manager
//!
//! Keeps one logical connection alive across transport failures.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::dispatch::{DispatchOutcome, Dispatcher, HandlerAction, HandlerContext, MessageHandler};
use super::message::Message;
use super::queue::OutboundQueue;
use super::subscriptions::SubscriptionRegistry;
use super::transport::{ConnectionState, Connector, Transport, TransportEvent, TransportResult};
use crate::config::ClientConfig;

/// Counters describing what the connection manager has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Transports opened through the connector.
    pub connect_attempts: u64,
    /// Connections that reached the open state.
    pub opens: u64,
    /// Connections that closed.
    pub closes: u64,
    /// Transport error events.
    pub transport_errors: u64,
    /// Messages written to a transport, control messages included.
    pub messages_sent: u64,
    /// Messages put in the outbound queue.
    pub messages_queued: u64,
    /// Messages lost to the queue bound or failed encoding.
    pub messages_dropped: u64,
    /// Inbound payloads that could not be decoded.
    pub decode_failures: u64,
    /// Inbound messages with no handler for their kind.
    pub unroutable: u64,
    /// Handler invocations that panicked.
    pub handler_panics: u64,
}

/// Connection lifecycle controller.
///
/// Owns the transport and drives it through
/// `Connecting → Open → Closed → (delay) → Connecting → …` for as long as
/// the manager lives, unless [`ConnectionManager::stop`] is called:
///
/// - On open, a subscribe message is sent for every registered channel
///   (registry order), then the outbound queue is flushed in FIFO order.
/// - Inbound messages are decoded and dispatched by kind. Undecodable and
///   unroutable messages are logged and dropped.
/// - An error closes the transport; only the close path schedules a
///   reconnect, after the configured delay.
///
/// Outbound queue and subscriptions survive every reconnect. Transport
/// failures never reach the caller: `send` and `subscribe` always succeed,
/// degrading to the queue when the connection is not open.
///
/// Nothing here blocks on the reconnect delay. The embedding application
/// calls [`ConnectionManager::poll`] in its loop; each call fires an
/// expired reconnect timer and handles pending transport events, one at a
/// time.
///
/// # Example
///
/// ```ignore
/// use courier_core::config::ClientConfig;
/// use courier_core::network::{ConnectionManager, Message, WebSocketConnector};
///
/// let config = ClientConfig::builder("ws://localhost:9000/ws")
///     .channels(["broadcast", "user-42"])
///     .build()?;
///
/// let mut client = ConnectionManager::new(WebSocketConnector::new(), config);
/// client.add_handler("pong", |msg, _ctx| println!("pong: {:?}", msg.fields));
/// client.send(Message::new("ping", "broadcast").with_field("count", 1));
/// client.start();
///
/// loop {
///     client.poll();
/// }
/// ```
pub struct ConnectionManager<C: Connector> {
    connector: C,
    config: ClientConfig,
    transport: Option<C::Transport>,
    state: ConnectionState,
    queue: OutboundQueue,
    subscriptions: SubscriptionRegistry,
    dispatcher: Dispatcher,
    reconnect_at: Option<Instant>,
    /// Consecutive attempts that closed without opening.
    failed_attempts: u32,
    stopped: bool,
    stats: ConnectionStats,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a connection manager and registers the configured initial
    /// channels. No connection is attempted until [`ConnectionManager::start`].
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let queue = match config.max_queued_messages {
            Some(max) => OutboundQueue::with_max_len(max),
            None => OutboundQueue::new(),
        };
        let initial_channels = config.initial_channels.clone();

        let mut manager = ConnectionManager {
            connector,
            config,
            transport: None,
            state: ConnectionState::Connecting,
            queue,
            subscriptions: SubscriptionRegistry::new(),
            dispatcher: Dispatcher::new(),
            reconnect_at: None,
            failed_attempts: 0,
            stopped: false,
            stats: ConnectionStats::default(),
        };

        for channel in &initial_channels {
            manager.subscribe(channel);
        }

        manager
    }

    /// Starts the first connection attempt.
    ///
    /// Does nothing while a transport exists or a reconnect is pending.
    /// After [`ConnectionManager::stop`], connects again immediately.
    pub fn start(&mut self) {
        if self.transport.is_some() {
            return;
        }
        if self.reconnect_at.is_some() && !self.stopped {
            return;
        }
        self.stopped = false;
        self.reconnect_at = None;
        self.connect();
    }

    /// Closes the connection and cancels reconnection.
    ///
    /// Queued messages and subscriptions are kept for a later `start`.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.reconnect_at = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            self.stats.closes += 1;
        }
        self.state = ConnectionState::Closed;
        info!(address = %self.config.address, "connection stopped");
    }

    /// Sends a message now if the connection is open, otherwise queues it.
    pub fn send(&mut self, message: Message) {
        if !self.is_connected() {
            self.enqueue(message);
            return;
        }

        let result = match self.transport.as_mut() {
            Some(transport) => Self::transmit(transport, &mut self.stats, &message),
            None => Ok(()),
        };

        if let Err(e) = result {
            warn!(kind = %message.kind, error = %e, "send failed, queueing message");
            self.enqueue(message);
            self.close_transport();
        }
    }

    /// Registers interest in `channel`.
    ///
    /// Returns false if the channel was already registered. A new channel is
    /// announced right away when the connection is open; otherwise the
    /// subscription replay on the next open announces it.
    pub fn subscribe(&mut self, channel: &str) -> bool {
        if !self.subscriptions.insert(channel) {
            debug!(channel, "already subscribed");
            return false;
        }
        if !self.is_connected() {
            return true;
        }

        // Never queued: the replay on the next open announces it instead.
        let result = match self.transport.as_mut() {
            Some(transport) => {
                Self::transmit(transport, &mut self.stats, &Message::subscribe(channel))
            }
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!(channel, error = %e, "subscribe failed, closing connection");
            self.close_transport();
        }
        true
    }

    /// Appends a handler for messages of `kind`.
    pub fn add_handler<F>(&mut self, kind: &str, handler: F)
    where
        F: Fn(&Message, &mut HandlerContext) + Send + Sync + 'static,
    {
        self.dispatcher.add_handler(kind, handler);
    }

    /// Appends a shared handler for messages of `kind`.
    pub fn add_shared_handler(&mut self, kind: &str, handler: std::sync::Arc<dyn MessageHandler>) {
        self.dispatcher.add_shared_handler(kind, handler);
    }

    /// Installs the handler for messages whose kind has no handler.
    pub fn set_fallback_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Message, &mut HandlerContext) + Send + Sync + 'static,
    {
        self.dispatcher.set_fallback(handler);
    }

    /// Fires an expired reconnect timer and handles pending transport events.
    ///
    /// Returns the number of events handled.
    pub fn poll(&mut self) -> usize {
        self.poll_at(Instant::now())
    }

    /// Like [`ConnectionManager::poll`], with an explicit current time.
    pub fn poll_at(&mut self, mut now: Instant) -> usize {
        if let Some(deadline) = self.reconnect_at {
            if now >= deadline {
                self.reconnect_at = None;
                self.connect();
                // Opening may block; the next delay counts from when it returned.
                now = now.max(Instant::now());
            }
        }

        let mut handled = 0;
        while let Some(event) = self.next_event() {
            self.handle_event(event, now);
            handled += 1;
        }
        handled
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns true if connected and ready.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
            && self.transport.as_ref().is_some_and(|t| t.is_ready())
    }

    /// Returns true after [`ConnectionManager::stop`].
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// When the pending reconnect attempt fires, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Time left until the pending reconnect attempt.
    pub fn time_until_reconnect(&self, now: Instant) -> Option<Duration> {
        self.reconnect_at
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Registered channels, in registration order.
    pub fn subscriptions(&self) -> &[String] {
        self.subscriptions.channels()
    }

    /// Number of queued outbound messages.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Queued outbound messages, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = &Message> {
        self.queue.iter()
    }

    /// Returns the dispatch table.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the activity counters.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn connect(&mut self) {
        self.state = ConnectionState::Connecting;
        self.stats.connect_attempts += 1;
        info!(
            address = %self.config.address,
            attempt = self.stats.connect_attempts,
            "connecting"
        );
        let transport_config = self.config.transport_config();
        self.transport = Some(self.connector.open(&transport_config));
    }

    fn next_event(&mut self) -> Option<TransportEvent> {
        let transport = self.transport.as_mut()?;
        match transport.poll_event() {
            Ok(event) => event,
            Err(e) => Some(TransportEvent::Error(e.to_string())),
        }
    }

    fn handle_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Opened => self.on_open(),
            TransportEvent::Message(raw) => self.on_message(&raw),
            TransportEvent::Error(info) => self.on_error(&info),
            TransportEvent::Closed => self.on_close(now),
        }
    }

    fn on_open(&mut self) {
        self.state = ConnectionState::Open;
        self.failed_attempts = 0;
        self.stats.opens += 1;
        info!(
            address = %self.config.address,
            channels = self.subscriptions.len(),
            queued = self.queue.len(),
            "connection open"
        );

        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let stats = &mut self.stats;

        // The server forgets subscriptions across disconnects: re-assert all of them.
        let mut result: TransportResult<()> = Ok(());
        for message in self.subscriptions.replay() {
            result = Self::transmit(transport, stats, &message);
            if result.is_err() {
                break;
            }
        }

        if result.is_ok() {
            result = self
                .queue
                .flush(|message| Self::transmit(transport, stats, message))
                .map(|sent| {
                    if sent > 0 {
                        debug!(sent, "flushed outbound queue");
                    }
                });
        }

        if let Err(e) = result {
            warn!(error = %e, queued = self.queue.len(), "send failed while opening connection");
            self.close_transport();
        }
    }

    fn on_message(&mut self, raw: &str) {
        let message = match Message::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(error = %e, "dropping undecodable message");
                return;
            }
        };
        debug!(kind = %message.kind, channel = %message.channel, "message received");

        let mut ctx = HandlerContext::new();
        match self.dispatcher.dispatch(&message, &mut ctx) {
            DispatchOutcome::Delivered { panicked, .. } => {
                self.stats.handler_panics += panicked as u64;
            }
            DispatchOutcome::Unroutable { fallback_panicked } => {
                self.stats.unroutable += 1;
                if fallback_panicked {
                    self.stats.handler_panics += 1;
                }
            }
        }

        for action in ctx.into_actions() {
            match action {
                HandlerAction::Send(message) => self.send(message),
                HandlerAction::Subscribe(channel) => {
                    self.subscribe(&channel);
                }
            }
        }
    }

    fn on_error(&mut self, info: &str) {
        self.stats.transport_errors += 1;
        warn!(address = %self.config.address, error = info, "transport error");
        // Reconnecting is left to the close path.
        self.close_transport();
    }

    fn on_close(&mut self, now: Instant) {
        let was_open = self.state == ConnectionState::Open;
        self.transport = None;
        self.state = ConnectionState::Closed;
        self.stats.closes += 1;

        if self.stopped {
            info!(address = %self.config.address, "connection closed");
            return;
        }

        if !was_open {
            self.failed_attempts = self.failed_attempts.saturating_add(1);
        }
        let delay = self
            .config
            .backoff
            .delay(self.config.reconnect_delay(), self.failed_attempts);
        self.reconnect_at = Some(now + delay);

        info!(
            address = %self.config.address,
            delay_ms = delay.as_millis() as u64,
            queued = self.queue.len(),
            "connection closed, reconnecting"
        );
    }

    fn enqueue(&mut self, message: Message) {
        debug!(kind = %message.kind, queued = self.queue.len() + 1, "queueing message");
        self.stats.messages_queued += 1;
        if let Some(evicted) = self.queue.push(message) {
            self.stats.messages_dropped += 1;
            warn!(kind = %evicted.kind, "outbound queue full, dropped oldest message");
        }
    }

    fn close_transport(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            transport.close();
        }
    }

    fn transmit(
        transport: &mut C::Transport,
        stats: &mut ConnectionStats,
        message: &Message,
    ) -> TransportResult<()> {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                stats.messages_dropped += 1;
                warn!(kind = %message.kind, error = %e, "dropping unencodable message");
                return Ok(());
            }
        };
        transport.send(&payload)?;
        stats.messages_sent += 1;
        Ok(())
    }
}

// INLINE_TEST_REQUIRED: Tests private failed_attempts counter and reconnect timer
#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::backoff::BackoffStrategy;
    use crate::network::mock::MockConnector;

    fn create_test_config() -> ClientConfig {
        ClientConfig::new("ws://test.local/ws")
    }

    #[test]
    fn test_failed_attempts_grow_until_open() {
        let connector = MockConnector::new();
        let mut config = create_test_config();
        config.backoff = BackoffStrategy::Exponential {
            max_delay_ms: 60_000,
            jitter: false,
        };
        let mut conn = ConnectionManager::new(connector.clone(), config);
        let mut now = Instant::now();

        connector.fail_next_opens(3);
        conn.start();
        for expected in 1..=3u32 {
            conn.poll_at(now);
            assert_eq!(conn.failed_attempts, expected);
            let delay = conn.time_until_reconnect(now).unwrap();
            assert_eq!(delay, Duration::from_millis(2_000 << expected));
            now += delay;
            conn.poll_at(now);
        }

        connector.current().unwrap().emit_open();
        conn.poll_at(now);
        assert_eq!(conn.failed_attempts, 0);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_clean_close_uses_base_delay() {
        let connector = MockConnector::new().with_auto_open();
        let mut config = create_test_config();
        config.backoff = BackoffStrategy::Exponential {
            max_delay_ms: 60_000,
            jitter: false,
        };
        let mut conn = ConnectionManager::new(connector.clone(), config);
        let now = Instant::now();

        conn.start();
        conn.poll_at(now);
        connector.current().unwrap().emit_close();
        conn.poll_at(now);

        assert_eq!(conn.failed_attempts, 0);
        assert_eq!(conn.reconnect_at, Some(now + Duration::from_millis(2_000)));
    }

    #[test]
    fn test_stop_drops_transport() {
        let connector = MockConnector::new().with_auto_open();
        let mut conn = ConnectionManager::new(connector.clone(), create_test_config());

        conn.start();
        conn.poll();
        conn.stop();

        assert!(conn.transport.is_none());
        assert!(conn.reconnect_at.is_none());
        assert!(connector.current().unwrap().is_closed());
    }
}
