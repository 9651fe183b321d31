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

use crate::codec::{GraphSonSerializerV3, MessageSerializer};
use crate::graphson::{GraphSonReader, GraphSonV3Reader, GraphSonV3Writer, GraphSonWriter};
use crate::pool::Connector;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Pool size for sessionless clients when none is configured
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Sessions are pinned to one connection unless the caller asks otherwise
pub const DEFAULT_SESSION_POOL_SIZE: usize = 1;

/// Transport and client settings.
///
/// Everything except `traversal_source` and `show_endpoint` is forwarded to the
/// [`Connector`] untouched.
#[derive(Clone)]
pub struct ClientOptions {
    pub pool_size: Option<usize>,
    pub max_workers: Option<usize>,
    pub message_serializer: Option<Arc<dyn MessageSerializer>>,
    pub graphson_reader: Option<Arc<dyn GraphSonReader>>,
    pub graphson_writer: Option<Arc<dyn GraphSonWriter>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Overrides the manager's connector for this client only
    pub transport_factory: Option<Arc<dyn Connector>>,
    pub traversal_source: String,
    pub show_endpoint: bool,
    /// Transport specific settings the driver does not know about
    pub extensions: BTreeMap<String, Value>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            pool_size: None,
            max_workers: None,
            message_serializer: None,
            graphson_reader: None,
            graphson_writer: None,
            username: None,
            password: None,
            headers: BTreeMap::new(),
            transport_factory: None,
            traversal_source: "g".to_string(),
            show_endpoint: false,
            extensions: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("pool_size", &self.pool_size)
            .field("max_workers", &self.max_workers)
            .field(
                "message_serializer",
                &self.message_serializer.as_ref().map(|s| s.mime_type()),
            )
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("traversal_source", &self.traversal_source)
            .field("show_endpoint", &self.show_endpoint)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    pub fn with_message_serializer(mut self, serializer: Arc<dyn MessageSerializer>) -> Self {
        self.message_serializer = Some(serializer);
        self
    }

    pub fn with_graphson_reader(mut self, reader: Arc<dyn GraphSonReader>) -> Self {
        self.graphson_reader = Some(reader);
        self
    }

    pub fn with_graphson_writer(mut self, writer: Arc<dyn GraphSonWriter>) -> Self {
        self.graphson_writer = Some(writer);
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_transport_factory(mut self, connector: Arc<dyn Connector>) -> Self {
        self.transport_factory = Some(connector);
        self
    }

    pub fn with_traversal_source(mut self, name: impl Into<String>) -> Self {
        self.traversal_source = name.into();
        self
    }

    pub fn with_show_endpoint(mut self, show: bool) -> Self {
        self.show_endpoint = show;
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn pool_size_or(&self, default: usize) -> usize {
        self.pool_size.unwrap_or(default).max(1)
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            (Some(user), None) => Some((user.as_str(), "")),
            _ => None,
        }
    }

    pub fn reader(&self) -> Arc<dyn GraphSonReader> {
        self.graphson_reader
            .clone()
            .unwrap_or_else(|| Arc::new(GraphSonV3Reader))
    }

    pub fn writer(&self) -> Arc<dyn GraphSonWriter> {
        self.graphson_writer
            .clone()
            .unwrap_or_else(|| Arc::new(GraphSonV3Writer))
    }

    /// The configured serializer, or a GraphSON v3 one using the configured
    /// reader
    pub fn serializer(&self) -> Arc<dyn MessageSerializer> {
        self.message_serializer.clone().unwrap_or_else(|| {
            Arc::new(GraphSonSerializerV3::with_reader(self.reader()))
        })
    }

    /// Like [`ClientOptions::serializer`] but the fallback also understands
    /// the session processor
    pub fn session_serializer(&self) -> Arc<dyn MessageSerializer> {
        self.message_serializer.clone().unwrap_or_else(|| {
            Arc::new(GraphSonSerializerV3::with_reader(self.reader()).with_session())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_falls_back_and_never_hits_zero() {
        assert_eq!(ClientOptions::new().pool_size_or(DEFAULT_POOL_SIZE), 4);
        assert_eq!(ClientOptions::new().with_pool_size(0).pool_size_or(4), 1);
        assert_eq!(ClientOptions::new().with_pool_size(8).pool_size_or(1), 8);
    }

    #[test]
    fn debug_hides_password() {
        let options = ClientOptions::new().with_credentials("admin", "hunter2");
        let rendered = format!("{:?}", options);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn default_serializer_is_graphson_v3() {
        let serializer = ClientOptions::new().serializer();
        assert_eq!(serializer.mime_type(), "application/vnd.gremlin-v3.0+json");
    }
}
