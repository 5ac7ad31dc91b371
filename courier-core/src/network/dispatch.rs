// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Dispatch Table
//!
//! Routes inbound messages to handlers by message kind.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use super::message::Message;

/// Something a handler asked the connection manager to do.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerAction {
    /// Send a message (or queue it if the connection dropped meanwhile).
    Send(Message),
    /// Subscribe to a channel.
    Subscribe(String),
}

/// Gives handlers access to the connection manager.
///
/// Actions are collected while the handlers for one message run and are
/// applied by the connection manager once they have all returned.
#[derive(Debug, Default)]
pub struct HandlerContext {
    actions: Vec<HandlerAction>,
}

impl HandlerContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        HandlerContext::default()
    }

    /// Sends a message through the normal send path.
    pub fn send(&mut self, message: Message) {
        self.actions.push(HandlerAction::Send(message));
    }

    /// Subscribes to a channel.
    pub fn subscribe(&mut self, channel: impl Into<String>) {
        self.actions.push(HandlerAction::Subscribe(channel.into()));
    }

    /// Actions requested so far, in order.
    pub fn actions(&self) -> &[HandlerAction] {
        &self.actions
    }

    /// Consumes the context, returning the requested actions.
    pub fn into_actions(self) -> Vec<HandlerAction> {
        self.actions
    }
}

/// Handler for inbound messages of one kind.
///
/// Implemented for every `Fn(&Message, &mut HandlerContext)` closure.
pub trait MessageHandler: Send + Sync {
    /// Called once per inbound message of the registered kind.
    fn handle(&self, message: &Message, ctx: &mut HandlerContext);
}

impl<F> MessageHandler for F
where
    F: Fn(&Message, &mut HandlerContext) + Send + Sync,
{
    fn handle(&self, message: &Message, ctx: &mut HandlerContext) {
        self(message, ctx)
    }
}

/// What happened when a message was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Registered handlers ran; `panicked` of them panicked.
    Delivered { handlers: usize, panicked: usize },
    /// No handler is registered for the kind. The fallback, if any, ran.
    Unroutable { fallback_panicked: bool },
}

/// Mapping from message kind to an ordered list of handlers.
///
/// Handlers are permanent for the lifetime of the table.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Vec<Arc<dyn MessageHandler>>>,
    fallback: Option<Arc<dyn MessageHandler>>,
}

impl Dispatcher {
    /// Creates an empty dispatch table.
    pub fn new() -> Self {
        Dispatcher::default()
    }

    /// Appends a handler for `kind`.
    pub fn add_handler<F>(&mut self, kind: &str, handler: F)
    where
        F: Fn(&Message, &mut HandlerContext) + Send + Sync + 'static,
    {
        self.add_shared_handler(kind, Arc::new(handler));
    }

    /// Appends a shared handler for `kind`.
    pub fn add_shared_handler(&mut self, kind: &str, handler: Arc<dyn MessageHandler>) {
        self.handlers
            .entry(kind.to_string())
            .or_default()
            .push(handler);
    }

    /// Installs the handler used for kinds with no registered handler.
    pub fn set_fallback<F>(&mut self, handler: F)
    where
        F: Fn(&Message, &mut HandlerContext) + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(handler));
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: &str) -> usize {
        self.handlers.get(kind).map_or(0, Vec::len)
    }

    /// Returns true if at least one handler is registered for `kind`.
    pub fn has_handlers(&self, kind: &str) -> bool {
        self.handler_count(kind) > 0
    }

    /// Invokes every handler registered for `message.kind`, in registration
    /// order.
    ///
    /// Each invocation is isolated: a panicking handler is logged and the
    /// remaining handlers still receive the message.
    pub fn dispatch(&self, message: &Message, ctx: &mut HandlerContext) -> DispatchOutcome {
        let Some(handlers) = self.handlers.get(&message.kind) else {
            debug!(kind = %message.kind, "no handler for message kind");
            let fallback_panicked = self
                .fallback
                .as_ref()
                .is_some_and(|fallback| !invoke(&**fallback, message, ctx));
            return DispatchOutcome::Unroutable { fallback_panicked };
        };

        let mut panicked = 0;
        for handler in handlers {
            if !invoke(&**handler, message, ctx) {
                panicked += 1;
            }
        }

        DispatchOutcome::Delivered {
            handlers: handlers.len(),
            panicked,
        }
    }
}

/// Runs one handler. Returns false if it panicked.
fn invoke(handler: &dyn MessageHandler, message: &Message, ctx: &mut HandlerContext) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message, ctx))) {
        Ok(()) => true,
        Err(payload) => {
            error!(
                kind = %message.kind,
                reason = panic_reason(&*payload),
                "message handler panicked"
            );
            false
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        reason
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason
    } else {
        "unknown"
    }
}
