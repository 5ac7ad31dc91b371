// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Outbound Queue
//!
//! FIFO buffer for messages sent while the connection is not open.

use std::collections::VecDeque;

use super::message::Message;
use super::transport::TransportResult;

/// Ordered buffer of messages awaiting transmission.
///
/// Unbounded by default. With a maximum length the oldest entry is dropped
/// to make room for a new one. Identical messages are kept as separate
/// entries.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: VecDeque<Message>,
    max_len: Option<usize>,
}

impl OutboundQueue {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        OutboundQueue::default()
    }

    /// Creates a queue holding at most `max_len` messages (at least one).
    pub fn with_max_len(max_len: usize) -> Self {
        OutboundQueue {
            max_len: Some(max_len.max(1)),
            ..Default::default()
        }
    }

    /// Appends a message at the tail.
    ///
    /// Returns the evicted head entry if the queue was full.
    pub fn push(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(message);
        evicted
    }

    /// Sends every entry from head to tail through `send`.
    ///
    /// Stops at the first failure, putting the failed message back at the
    /// head so nothing is lost or reordered. Returns how many were sent.
    pub fn flush<F>(&mut self, mut send: F) -> TransportResult<usize>
    where
        F: FnMut(&Message) -> TransportResult<()>,
    {
        let mut sent = 0;
        while let Some(message) = self.entries.pop_front() {
            if let Err(e) = send(&message) {
                self.entries.push_front(message);
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates queued messages from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Maximum length, `None` if unbounded.
    pub fn max_len(&self) -> Option<usize> {
        self.max_len
    }

    fn is_full(&self) -> bool {
        self.max_len.is_some_and(|max| self.entries.len() >= max)
    }
}
