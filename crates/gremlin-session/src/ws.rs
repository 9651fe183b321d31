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

//! WebSocket transport
//!
//! Each pooled connection carries at most one request at a time: a lease
//! handed out by [`ConnectionPool::acquire`] is held by the in-flight request
//! and returned to the pool when the final response frame arrives. A
//! background task per connection reads frames and routes them to the
//! pending request by request id.

use crate::codec::MessageSerializer;
use crate::endpoint::{Endpoint, EndpointResolver};
use crate::error::{GremlinError, Result};
use crate::message::{Processor, RequestMessage, ResponseMessage, ResultSet, status};
use crate::ops::authentication_request;
use crate::options::{ClientOptions, DEFAULT_POOL_SIZE};
use crate::pool::{Connection, ConnectionPool, Connector, ResponseFuture, ResponseSender};
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpStream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens [`WsPool`]s. This is the default [`Connector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        endpoints: Arc<dyn EndpointResolver>,
        options: &'a ClientOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn ConnectionPool>>> {
        Box::pin(async move {
            let pool = WsPool::open(endpoint, endpoints, options).await?;
            Ok(Arc::new(pool) as Arc<dyn ConnectionPool>)
        })
    }
}

/// Everything needed to (re)open one connection. Reopening resolves the
/// endpoint again so that signed or rotated headers are fresh.
struct ConnectionSettings {
    uri: String,
    headers: BTreeMap<String, String>,
    endpoints: Arc<dyn EndpointResolver>,
    serializer: Arc<dyn MessageSerializer>,
    credentials: Option<(String, String)>,
}

impl ConnectionSettings {
    fn new(endpoint: &Endpoint, endpoints: Arc<dyn EndpointResolver>, options: &ClientOptions) -> Self {
        Self {
            uri: endpoint.uri.clone(),
            headers: options.headers.clone(),
            endpoints,
            serializer: options.serializer(),
            credentials: options
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        }
    }

    fn handshake_request(&self, endpoint: &Endpoint) -> Result<Request> {
        // Endpoint headers last: signed or rotated values win over caller defaults
        let mut merged = self.headers.clone();
        merged.extend(endpoint.headers.clone());

        let mut request = endpoint.uri.as_str().into_client_request()?;
        let headers = request.headers_mut();
        for (name, value) in &merged {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| GremlinError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| GremlinError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            headers.insert(header_name, header_value);
        }
        Ok(request)
    }
}

struct PendingRequest {
    processor: Processor,
    results: ResultSet,
    tx: ResponseSender,
    // Goes back to the pool when this entry is dropped
    _lease: Box<WsLease>,
}

/// State shared between a connection handle and its reader task
struct ConnectionShared {
    sink: tokio::sync::Mutex<SplitSink<WsStream, WsMessage>>,
    pending: Mutex<HashMap<Uuid, PendingRequest>>,
    serializer: Arc<dyn MessageSerializer>,
    credentials: Option<(String, String)>,
    alive: AtomicBool,
}

impl ConnectionShared {
    fn pending(&self) -> MutexGuard<'_, HashMap<Uuid, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn send_frame(&self, frame: Vec<u8>) -> Result<()> {
        self.sink.lock().await.send(WsMessage::Binary(frame)).await?;
        Ok(())
    }

    async fn send(&self, request: &RequestMessage) -> Result<()> {
        let frame = self.serializer.serialize_message(request)?;
        self.send_frame(frame).await
    }

    fn complete(&self, id: Uuid, result: Result<ResultSet>) {
        let entry = self.pending().remove(&id);
        if let Some(entry) = entry {
            let _ = entry.tx.send(result);
        }
    }

    fn fail_all(&self) {
        let drained: Vec<PendingRequest> = self.pending().drain().map(|(_, p)| p).collect();
        for entry in drained {
            let _ = entry.tx.send(Err(GremlinError::ConnectionClosed));
        }
    }

    async fn handle(&self, response: ResponseMessage) {
        let Some(id) = response.request_id else {
            tracing::warn!(code = response.status.code, "response without request id");
            return;
        };

        match response.status.code {
            status::AUTHENTICATE => {
                let processor = self.pending().get(&id).map(|p| p.processor);
                let Some(processor) = processor else {
                    return;
                };
                match &self.credentials {
                    Some((user, pass)) => {
                        tracing::debug!(request_id = %id, "answering authentication challenge");
                        let auth = authentication_request(id, processor, user, pass);
                        if let Err(e) = self.send(&auth).await {
                            self.complete(id, Err(e));
                        }
                    }
                    None => self.complete(
                        id,
                        Err(GremlinError::server(
                            status::AUTHENTICATE,
                            "server requires authentication but no credentials are configured",
                            response.status.attributes,
                        )),
                    ),
                }
            }
            status::PARTIAL_CONTENT => {
                if let Some(entry) = self.pending().get_mut(&id) {
                    entry.results.extend_from(response.result.data);
                }
            }
            code @ (status::SUCCESS | status::NO_CONTENT) => {
                let entry = self.pending().remove(&id);
                if let Some(mut entry) = entry {
                    if code == status::SUCCESS {
                        entry.results.extend_from(response.result.data);
                    }
                    entry.results.attributes = response.status.attributes;
                    let _ = entry.tx.send(Ok(entry.results));
                }
            }
            code => self.complete(
                id,
                Err(GremlinError::server(
                    code,
                    response.status.message,
                    response.status.attributes,
                )),
            ),
        }
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, shared: Arc<ConnectionShared>) {
    while let Some(frame) = stream.next().await {
        let data = match frame {
            Ok(WsMessage::Binary(data)) => data,
            Ok(WsMessage::Text(text)) => text.into_bytes(),
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "websocket read failed");
                break;
            }
        };

        match shared.serializer.deserialize_message(&data) {
            Ok(response) => shared.handle(response).await,
            Err(e) => tracing::warn!(error = %e, "dropping undecodable response"),
        }
    }

    shared.alive.store(false, Ordering::SeqCst);
    shared.fail_all();
}

struct WsConnection {
    shared: Arc<ConnectionShared>,
    reader: JoinHandle<()>,
}

impl WsConnection {
    async fn open(settings: &ConnectionSettings, endpoint: &Endpoint) -> Result<Self> {
        let request = settings.handshake_request(endpoint)?;
        let (stream, _response) = connect_async(request).await?;
        let (sink, stream) = stream.split();

        let shared = Arc::new(ConnectionShared {
            sink: tokio::sync::Mutex::new(sink),
            pending: Mutex::new(HashMap::new()),
            serializer: settings.serializer.clone(),
            credentials: settings.credentials.clone(),
            alive: AtomicBool::new(true),
        });
        let reader = tokio::spawn(read_loop(stream, shared.clone()));

        Ok(Self { shared, reader })
    }

    fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Stop reading and fail whatever is still pending
    fn abort(&self) {
        self.reader.abort();
        self.shared.alive.store(false, Ordering::SeqCst);
        self.shared.fail_all();
    }

    async fn shutdown(&self) {
        if let Err(e) = self.shared.sink.lock().await.close().await {
            tracing::debug!(error = %e, "websocket close failed");
        }
        self.abort();
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

struct PoolShared {
    settings: ConnectionSettings,
    idle: Mutex<VecDeque<Arc<WsConnection>>>,
    permits: Arc<Semaphore>,
    size: usize,
    closed: AtomicBool,
}

impl PoolShared {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Arc<WsConnection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed-size pool of WebSocket connections, all opened up front
pub struct WsPool {
    shared: Arc<PoolShared>,
}

impl WsPool {
    /// Open `pool_size` connections to `endpoint`. Connections that drop
    /// later are reopened against a fresh resolution from `endpoints`.
    pub async fn open(
        endpoint: &Endpoint,
        endpoints: Arc<dyn EndpointResolver>,
        options: &ClientOptions,
    ) -> Result<Self> {
        let size = options.pool_size_or(DEFAULT_POOL_SIZE);
        let settings = ConnectionSettings::new(endpoint, endpoints, options);
        if let Some(workers) = options.max_workers {
            tracing::debug!(workers, "max_workers is not used by the websocket transport");
        }

        let mut connections = VecDeque::with_capacity(size);
        for _ in 0..size {
            match WsConnection::open(&settings, endpoint).await {
                Ok(connection) => connections.push_back(Arc::new(connection)),
                Err(e) => {
                    for connection in &connections {
                        connection.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }
        tracing::debug!(uri = %settings.uri, size, "opened websocket pool");

        Ok(Self {
            shared: Arc::new(PoolShared {
                settings,
                idle: Mutex::new(connections),
                permits: Arc::new(Semaphore::new(size)),
                size,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl ConnectionPool for WsPool {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            let permit = self
                .shared
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| GremlinError::PoolClosed)?;
            let connection = self
                .shared
                .idle()
                .pop_front()
                .ok_or(GremlinError::PoolClosed)?;

            Ok(Box::new(WsLease {
                connection,
                pool: self.shared.clone(),
                _permit: permit,
            }) as Box<dyn Connection>)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.shared.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            self.shared.permits.close();

            let idle: Vec<Arc<WsConnection>> = self.shared.idle().drain(..).collect();
            for connection in idle {
                connection.shutdown().await;
            }
            Ok(())
        })
    }

    fn size(&self) -> usize {
        self.shared.size
    }
}

/// Exclusive use of one pooled connection
struct WsLease {
    connection: Arc<WsConnection>,
    pool: Arc<PoolShared>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for WsLease {
    fn drop(&mut self) {
        if self.pool.closed.load(Ordering::SeqCst) {
            self.connection.abort();
        } else {
            self.pool.idle().push_back(self.connection.clone());
        }
    }
}

impl Connection for WsLease {
    fn write(mut self: Box<Self>, request: RequestMessage) -> BoxFuture<'static, Result<ResponseFuture>> {
        Box::pin(async move {
            if !self.connection.is_alive() {
                let settings = &self.pool.settings;
                let endpoint = settings.endpoints.resolve()?;
                tracing::debug!(uri = %endpoint.uri, "reopening dropped connection");
                self.connection = Arc::new(WsConnection::open(settings, &endpoint).await?);
            }

            let shared = self.connection.shared.clone();
            let frame = shared.serializer.serialize_message(&request)?;
            let id = request.request_id;
            let (tx, future) = ResponseFuture::channel();

            shared.pending().insert(
                id,
                PendingRequest {
                    processor: request.processor,
                    results: ResultSet::new(id),
                    tx,
                    _lease: self,
                },
            );

            if let Err(e) = shared.send_frame(frame).await {
                let entry = shared.pending().remove(&id);
                drop(entry);
                return Err(e);
            }
            if !shared.is_alive() {
                shared.complete(id, Err(GremlinError::ConnectionClosed));
            }
            Ok(future)
        })
    }
}
