//! Subscription Registry
//!
//! Channels the client has declared interest in. Replayed to the server on
//! every (re)connect, since the server forgets subscriptions across
//! disconnects.

use std::collections::HashSet;

use super::message::Message;

/// Deduplicated, insertion-ordered set of channel names.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    order: Vec<String>,
    members: HashSet<String>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        SubscriptionRegistry::default()
    }

    /// Adds a channel. Returns false if it was already registered.
    pub fn insert(&mut self, channel: &str) -> bool {
        if !self.members.insert(channel.to_string()) {
            return false;
        }
        self.order.push(channel.to_string());
        true
    }

    /// Returns true if `channel` is registered.
    pub fn contains(&self, channel: &str) -> bool {
        self.members.contains(channel)
    }

    /// Channels in registration order.
    pub fn channels(&self) -> &[String] {
        &self.order
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Subscribe control messages for every channel, in registration order.
    pub fn replay(&self) -> impl Iterator<Item = Message> + '_ {
        self.order.iter().map(Message::subscribe)
    }
}
