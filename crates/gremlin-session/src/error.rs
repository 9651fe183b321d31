// Copyright (C) 2025 Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

pub type Result<T> = std::result::Result<T, GremlinError>;

#[derive(Debug, Error)]
pub enum GremlinError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Timeout after {duration:?} while {operation}")]
    Timeout { operation: String, duration: Duration },

    #[error("Unsupported message type: {0}")]
    UnsupportedMessageType(&'static str),

    #[error("Bindings only apply to scripts and prebuilt requests, not {0}")]
    UnexpectedBindings(&'static str),

    #[error("Processor '{processor}' does not support op '{op}'")]
    UnsupportedOperation { processor: String, op: String },

    #[error("Unknown processor: '{0}'")]
    UnknownProcessor(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Server error {code}: {message}")]
    Server {
        code: u16,
        message: String,
        attributes: Map<String, Value>,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Connection closed before the response completed")]
    ConnectionClosed,

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("{} resource(s) failed to close: {}", .0.len(), join_errors(.0))]
    CloseFailed(Vec<GremlinError>),
}

fn join_errors(errors: &[GremlinError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for GremlinError {
    fn from(error: serde_json::Error) -> Self {
        GremlinError::Codec(error.to_string())
    }
}

impl From<figment::Error> for GremlinError {
    fn from(error: figment::Error) -> Self {
        GremlinError::Config(Box::new(error))
    }
}

impl GremlinError {
    /// Network or client level failures that may succeed when the connection
    /// is opened again. Only these are retried, and only at open time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout { .. } => true,
            Self::WebSocket(e) => !matches!(
                e,
                tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_)
            ),
            _ => false,
        }
    }

    /// Caller mistakes that fail before any traffic is sent.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMessageType(_)
                | Self::UnexpectedBindings(_)
                | Self::UnsupportedOperation { .. }
                | Self::UnknownProcessor(_)
                | Self::InvalidSessionId(_)
                | Self::InvalidHeader { .. }
        )
    }

    pub(crate) fn server(code: u16, message: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self::Server {
            code,
            message: message.into(),
            attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_transient() {
        let err = GremlinError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(err.is_transient());
        assert!(!err.is_usage_error());
    }

    #[test]
    fn usage_errors_are_not_transient() {
        let err = GremlinError::UnsupportedMessageType("bytecode");
        assert!(err.is_usage_error());
        assert!(!err.is_transient());
        assert!(!GremlinError::SessionClosed("abc".into()).is_transient());
        assert!(!GremlinError::server(500, "boom", Map::new()).is_transient());
    }

    #[test]
    fn close_failed_lists_every_failure() {
        let err = GremlinError::CloseFailed(vec![
            GremlinError::PoolClosed,
            GremlinError::Protocol("bad frame".into()),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 resource(s) failed to close"));
        assert!(text.contains("Connection pool is closed"));
        assert!(text.contains("bad frame"));
    }
}
