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

//! Transport seams
//!
//! The session layer only needs three capabilities from a transport: build a
//! pool for an endpoint ([`Connector`]), lease a connection from that pool
//! ([`ConnectionPool::acquire`]), and write one request on the leased
//! connection ([`Connection::write`]). [`crate::ws::WsConnector`] is the
//! default implementation.

use crate::endpoint::{Endpoint, EndpointResolver};
use crate::error::{GremlinError, Result};
use crate::message::{RequestMessage, ResultSet};
use crate::options::ClientOptions;
use futures::future::BoxFuture;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// A connection leased from a pool.
///
/// Writing consumes the lease: the connection travels with the in-flight
/// request and goes back to the pool when its response completes.
pub trait Connection: Send {
    fn write(self: Box<Self>, request: RequestMessage) -> BoxFuture<'static, Result<ResponseFuture>>;
}

pub trait ConnectionPool: Send + Sync {
    /// Wait until a connection is free. There is no timeout.
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>>;

    /// Shut down every connection in the pool.
    fn close(&self) -> BoxFuture<'_, Result<()>>;

    fn size(&self) -> usize;
}

/// Builds a pool for a resolved endpoint. `endpoints` is the resolver that
/// produced it, for transports that reconnect later. `options` are passed
/// through as given; the session layer never interprets them.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        endpoints: Arc<dyn EndpointResolver>,
        options: &'a ClientOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn ConnectionPool>>>;
}

/// The eventual result of a written request
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<ResultSet>>,
}

/// Completes a [`ResponseFuture`]
pub type ResponseSender = oneshot::Sender<Result<ResultSet>>;

impl ResponseFuture {
    pub fn channel() -> (ResponseSender, ResponseFuture) {
        let (tx, rx) = oneshot::channel();
        (tx, ResponseFuture { rx })
    }

    /// An already completed response
    pub fn ready(result: Result<ResultSet>) -> Self {
        let (tx, future) = Self::channel();
        let _ = tx.send(result);
        future
    }
}

impl Future for ResponseFuture {
    type Output = Result<ResultSet>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped: the connection went away mid-request
            Poll::Ready(Err(_)) => Poll::Ready(Err(GremlinError::ConnectionClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn ready_future_resolves() {
        let id = Uuid::new_v4();
        let result = ResponseFuture::ready(Ok(ResultSet::new(id))).await;
        assert_eq!(result.expect("should resolve").request_id, id);
    }

    #[test]
    fn stays_pending_until_completed() {
        let (tx, future) = ResponseFuture::channel();
        let mut task = tokio_test::task::spawn(future);
        tokio_test::assert_pending!(task.poll());

        let id = Uuid::new_v4();
        tx.send(Ok(ResultSet::new(id))).expect("receiver alive");
        assert!(task.is_woken());
        let result = tokio_test::assert_ready!(task.poll());
        assert_eq!(result.expect("completed").request_id, id);
    }

    #[tokio::test]
    async fn dropped_sender_reports_closed_connection() {
        let (tx, future) = ResponseFuture::channel();
        drop(tx);
        assert!(matches!(future.await, Err(GremlinError::ConnectionClosed)));
    }
}
