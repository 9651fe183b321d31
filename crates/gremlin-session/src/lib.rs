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

//! # Gremlin Session
//!
//! An async Gremlin client with server-side sessions, connection retry and
//! bulk cleanup.
//!
//! ## Example
//!
//! ```no_run
//! use gremlin_session::{ClientOptions, Endpoints, GremlinManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = GremlinManager::new(Endpoints::load()?);
//!     let session = manager.sessioned_client(None, ClientOptions::new()).await?;
//!
//!     session.submit("g.addV('person').property('name', 'ada')", None, None).await?.await?;
//!     let count = session.submit("g.V().count()", None, None).await?.await?;
//!     println!("Vertices: {:?}", count.one());
//!
//!     manager.close().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
mod connection;
mod endpoint;
mod error;
pub mod graphson;
mod manager;
mod message;
pub mod ops;
mod options;
mod pool;
mod registry;
mod session;
pub mod traversal;
mod ws;

pub use codec::{GraphSonSerializerV3, MessageSerializer, OpProcessor};
pub use connection::{Client, RemoteConnection};
pub use endpoint::{Endpoint, EndpointResolver, Endpoints};
pub use error::{GremlinError, Result};
pub use manager::{GremlinManager, MAX_OPEN_RETRIES};
pub use message::{
    Args, Bindings, Message, Op, Processor, RequestMessage, RequestOptions, ResponseMessage,
    ResponseResult, ResultSet, Status, status,
};
pub use options::{ClientOptions, DEFAULT_POOL_SIZE, DEFAULT_SESSION_POOL_SIZE};
pub use pool::{Connection, ConnectionPool, Connector, ResponseFuture, ResponseSender};
pub use registry::{Closeable, ConnectionRegistry};
pub use session::{Session, SessionState, SessionedClient};
pub use ws::{WsConnector, WsPool};
