// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Errors

use thiserror::Error;

/// Errors produced by transports and the message codec.
///
/// None of these reach callers of `send` or `subscribe`: the connection
/// manager absorbs transport failures and recovers by reconnecting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote end closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport is not open.
    #[error("Transport not connected")]
    NotConnected,

    /// Writing to the transport failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Reading from the transport failed.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// A payload could not be decoded into a message.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::InvalidMessage(err.to_string())
    }
}
