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

/// Sessionless Gremlin clients over a connection pool
use crate::error::{GremlinError, Result};
use crate::graphson::GraphSonWriter;
use crate::message::{Bindings, Message, RequestMessage, RequestOptions};
use crate::ops::{bytecode_request, eval_request};
use crate::options::ClientOptions;
use crate::pool::{ConnectionPool, ResponseFuture};
use crate::traversal::Bytecode;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct ClientInner {
    uri: String,
    pool: Arc<dyn ConnectionPool>,
    writer: Arc<dyn GraphSonWriter>,
    traversal_source: String,
    closed: AtomicBool,
}

/// A sessionless client. Every request runs in its own server-side
/// transaction. Cloning is cheap and clones share the pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("uri", &self.inner.uri)
            .field("traversal_source", &self.inner.traversal_source)
            .field("pool_size", &self.inner.pool.size())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Client {
    /// Wrap an already opened pool
    pub fn from_pool(
        uri: impl Into<String>,
        pool: Arc<dyn ConnectionPool>,
        options: &ClientOptions,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                uri: uri.into(),
                pool,
                writer: options.writer(),
                traversal_source: options.traversal_source.clone(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// Graph the `g` alias is bound to on the server
    pub fn traversal_source(&self) -> &str {
        &self.inner.traversal_source
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool.size()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Submit a script, bytecode, or prebuilt request.
    ///
    /// Returns once the request is written; await the returned future for
    /// the results. `bindings` and `request_options` apply to scripts and
    /// prebuilt requests; bytecode carries its values inline, so bindings
    /// given with bytecode are rejected.
    pub async fn submit(
        &self,
        message: impl Into<Message>,
        bindings: Option<Bindings>,
        request_options: Option<RequestOptions>,
    ) -> Result<ResponseFuture> {
        let request = match message.into() {
            Message::Script(gremlin) => {
                eval_request(gremlin, self.traversal_source(), bindings, request_options)
            }
            Message::Bytecode(_) if bindings.as_ref().is_some_and(|b| !b.is_empty()) => {
                return Err(GremlinError::UnexpectedBindings("bytecode"));
            }
            Message::Bytecode(bytecode) => {
                bytecode_request(&bytecode, self.traversal_source(), self.inner.writer.as_ref())
            }
            Message::Request(mut request) => {
                if let Some(bindings) = bindings.filter(|b| !b.is_empty()) {
                    request.args.insert("bindings".to_string(), Value::Object(bindings));
                }
                if let Some(options) = request_options {
                    request.args.extend(options);
                }
                request
            }
        };
        self.write(request).await
    }

    /// Lease a connection (waiting as long as it takes) and write `request`
    pub(crate) async fn write(&self, request: RequestMessage) -> Result<ResponseFuture> {
        if self.is_closed() {
            return Err(GremlinError::PoolClosed);
        }

        let connection = self.inner.pool.acquire().await?;
        tracing::debug!(
            request_id = %request.request_id,
            processor = %request.processor,
            op = %request.op,
            "writing request"
        );
        connection.write(request).await
    }

    /// Close the pool. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(uri = %self.inner.uri, "closing client");
        self.inner.pool.close().await
    }
}

/// A client dedicated to bytecode traversals, the backing for
/// [`crate::traversal::GraphTraversalSource`]
#[derive(Clone, Debug)]
pub struct RemoteConnection {
    client: Client,
}

impl RemoteConnection {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn submit(&self, bytecode: &Bytecode) -> Result<ResponseFuture> {
        self.client.submit(bytecode.clone(), None, None).await
    }

    pub async fn close(&self) -> Result<()> {
        self.client.close().await
    }
}
