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

//! Entry point: opens clients against a resolved endpoint and remembers
//! them so they can be closed together.

use crate::connection::{Client, RemoteConnection};
use crate::endpoint::{Endpoint, EndpointResolver};
use crate::error::Result;
use crate::options::{ClientOptions, DEFAULT_POOL_SIZE, DEFAULT_SESSION_POOL_SIZE};
use crate::pool::{ConnectionPool, Connector};
use crate::registry::ConnectionRegistry;
use crate::session::{Session, SessionedClient};
use crate::traversal::GraphTraversalSource;
use crate::ws::WsConnector;
use std::sync::Arc;

/// Additional attempts after a transient failure while opening a connection
pub const MAX_OPEN_RETRIES: usize = 3;

pub struct GremlinManager {
    endpoints: Arc<dyn EndpointResolver>,
    connector: Arc<dyn Connector>,
    registry: ConnectionRegistry,
}

impl std::fmt::Debug for GremlinManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GremlinManager")
            .field("open", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl GremlinManager {
    /// A manager using the WebSocket transport
    pub fn new(endpoints: impl EndpointResolver + 'static) -> Self {
        Self::with_connector(Arc::new(endpoints), Arc::new(WsConnector))
    }

    pub fn with_connector(endpoints: Arc<dyn EndpointResolver>, connector: Arc<dyn Connector>) -> Self {
        Self {
            endpoints,
            connector,
            registry: ConnectionRegistry::new(),
        }
    }

    /// Number of resources that a call to [`GremlinManager::close`] would close
    pub fn open_count(&self) -> usize {
        self.registry.len()
    }

    fn connector_for<'a>(&'a self, options: &'a ClientOptions) -> &'a dyn Connector {
        options
            .transport_factory
            .as_deref()
            .unwrap_or(self.connector.as_ref())
    }

    fn resolve(&self, options: &ClientOptions) -> Result<Endpoint> {
        let endpoint = self.endpoints.resolve()?;
        if options.show_endpoint {
            tracing::info!(uri = %endpoint.uri, "gremlin endpoint");
        }
        Ok(endpoint)
    }

    /// Resolve the endpoint and open a pool, once
    async fn connect_once(&self, options: &ClientOptions) -> Result<(Endpoint, Arc<dyn ConnectionPool>)> {
        let endpoint = self.resolve(options)?;
        let pool = self
            .connector_for(options)
            .connect(&endpoint, self.endpoints.clone(), options)
            .await?;
        Ok((endpoint, pool))
    }

    /// Open a pool, retrying transient failures. Callers register what they
    /// build on top of it.
    ///
    /// The endpoint is resolved again before every attempt. After
    /// [`MAX_OPEN_RETRIES`] retries the last error is returned unchanged;
    /// non-transient errors are returned at once.
    async fn open_connection(&self, options: &ClientOptions) -> Result<(Endpoint, Arc<dyn ConnectionPool>)> {
        let mut retries = 0;
        loop {
            match self.connect_once(options).await {
                Ok(opened) => return Ok(opened),
                Err(e) if e.is_transient() && retries < MAX_OPEN_RETRIES => {
                    retries += 1;
                    tracing::warn!(
                        attempt = retries + 1,
                        max_attempts = MAX_OPEN_RETRIES + 1,
                        error = %e,
                        "Connection timeout. Retrying..."
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Open a connection for bytecode traversals, with retry
    pub async fn remote_connection(&self, options: ClientOptions) -> Result<RemoteConnection> {
        let (endpoint, pool) = self.open_connection(&options).await?;
        let connection = RemoteConnection::new(Client::from_pool(endpoint.uri, pool, &options));
        self.registry.register(Box::new(connection.clone()));
        Ok(connection)
    }

    /// Bind a traversal source to `connection`, opening one with default
    /// options if none is given
    pub async fn traversal_source(&self, connection: Option<RemoteConnection>) -> Result<GraphTraversalSource> {
        let connection = match connection {
            Some(connection) => connection,
            None => {
                self.remote_connection(ClientOptions::new().with_show_endpoint(true))
                    .await?
            }
        };
        Ok(GraphTraversalSource::new(connection))
    }

    /// Open a sessionless client. A single attempt; the pool handles
    /// reconnection from there.
    pub async fn client(&self, mut options: ClientOptions) -> Result<Client> {
        options.pool_size = Some(options.pool_size_or(DEFAULT_POOL_SIZE));
        let (endpoint, pool) = self.connect_once(&options).await?;

        let client = Client::from_pool(endpoint.uri, pool, &options);
        self.registry.register(Box::new(client.clone()));
        Ok(client)
    }

    /// Open a client bound to a server-side session.
    ///
    /// A random session id is generated when `session_id` is `None`. The pool
    /// defaults to a single connection; larger pools are allowed but give up
    /// request ordering within the session. Unless a serializer is given, one
    /// that understands the session processor is used.
    pub async fn sessioned_client(
        &self,
        session_id: Option<String>,
        mut options: ClientOptions,
    ) -> Result<SessionedClient> {
        let session = Session::from_caller(session_id)?;
        options.pool_size = Some(options.pool_size_or(DEFAULT_SESSION_POOL_SIZE));
        options.message_serializer = Some(options.session_serializer());

        let (endpoint, pool) = self.connect_once(&options).await?;
        tracing::debug!(session = %session, uri = %endpoint.uri, "opened sessioned client");

        let client = SessionedClient::new(Client::from_pool(endpoint.uri, pool, &options), session);
        self.registry.register(Box::new(client.clone()));
        Ok(client)
    }

    /// Close everything this manager opened. Every resource is attempted;
    /// failures are reported together. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        self.registry.close_all().await
    }
}
