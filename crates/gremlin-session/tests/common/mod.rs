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

//! In-memory transport that records what the session layer does with it

#![allow(dead_code)]

use futures::future::BoxFuture;
use gremlin_session::{
    ClientOptions, Connection, ConnectionPool, Connector, Endpoint, EndpointResolver, GremlinError,
    Op, RequestMessage, ResponseFuture, Result, ResultSet,
};
use serde_json::{Map, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FAKE_URI: &str = "ws://fake:8182/gremlin";

/// Everything the fake transport saw, shared by connector, pools and
/// connections
#[derive(Default)]
pub struct Recorder {
    pub written: Mutex<Vec<RequestMessage>>,
    pub events: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub acquires: AtomicUsize,
    pub pool_closes: AtomicUsize,
    /// Connect attempts left to fail with a refused connection
    pub failing_connects: AtomicUsize,
    /// Fail every connect attempt with a rejected handshake
    pub reject_connects: AtomicBool,
    /// Delay before any response completes
    pub response_delay: Mutex<Option<Duration>>,
    /// Answer session close requests with a server error
    pub reject_session_close: AtomicBool,
    /// Make pool close fail
    pub fail_pool_close: AtomicBool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn written(&self) -> Vec<RequestMessage> {
        self.written.lock().unwrap().clone()
    }

    pub fn written_ops(&self, op: Op) -> usize {
        self.written().iter().filter(|r| r.op == op).count()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn event(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn connector(self: &Arc<Self>) -> Arc<FakeConnector> {
        Arc::new(FakeConnector {
            recorder: self.clone(),
        })
    }
}

pub struct FakeConnector {
    pub recorder: Arc<Recorder>,
}

impl Connector for FakeConnector {
    fn connect<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        _endpoints: Arc<dyn EndpointResolver>,
        options: &'a ClientOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn ConnectionPool>>> {
        Box::pin(async move {
            let attempt = self.recorder.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if self.recorder.reject_connects.load(Ordering::SeqCst) {
                return Err(GremlinError::Protocol(format!("attempt {} rejected", attempt)));
            }
            let failing = self
                .recorder
                .failing_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(GremlinError::Connection(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("attempt {} refused", attempt),
                )));
            }
            self.recorder.event(format!("connect {}", endpoint.uri));

            Ok(Arc::new(FakePool {
                recorder: self.recorder.clone(),
                size: options.pool_size.unwrap_or(1),
            }) as Arc<dyn ConnectionPool>)
        })
    }
}

pub struct FakePool {
    recorder: Arc<Recorder>,
    size: usize,
}

impl ConnectionPool for FakePool {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            self.recorder.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeConnection {
                recorder: self.recorder.clone(),
            }) as Box<dyn Connection>)
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.recorder.pool_closes.fetch_add(1, Ordering::SeqCst);
            self.recorder.event("pool closed");
            if self.recorder.fail_pool_close.load(Ordering::SeqCst) {
                return Err(GremlinError::Protocol("pool refused to close".to_string()));
            }
            Ok(())
        })
    }

    fn size(&self) -> usize {
        self.size
    }
}

struct FakeConnection {
    recorder: Arc<Recorder>,
}

impl Connection for FakeConnection {
    fn write(self: Box<Self>, request: RequestMessage) -> BoxFuture<'static, Result<ResponseFuture>> {
        Box::pin(async move {
            let recorder = self.recorder;
            recorder.written.lock().unwrap().push(request.clone());
            recorder.event(format!("write {}", request.op));

            let result = if request.op == Op::Close
                && recorder.reject_session_close.load(Ordering::SeqCst)
            {
                Err(GremlinError::Server {
                    code: 500,
                    message: "session close failed".to_string(),
                    attributes: Map::new(),
                })
            } else {
                let mut results = ResultSet::new(request.request_id);
                results.extend_from(json!([request.op.as_str()]));
                Ok(results)
            };

            let delay = *recorder.response_delay.lock().unwrap();
            let Some(delay) = delay else {
                recorder.event(format!("respond {}", request.op));
                return Ok(ResponseFuture::ready(result));
            };

            let (tx, future) = ResponseFuture::channel();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                recorder.event(format!("respond {}", request.op));
                let _ = tx.send(result);
            });
            Ok(future)
        })
    }
}

/// Resolves to a fixed endpoint and counts how often it was asked
#[derive(Default)]
pub struct CountingResolver {
    pub resolutions: AtomicUsize,
}

impl EndpointResolver for CountingResolver {
    fn resolve(&self) -> Result<Endpoint> {
        let n = self.resolutions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Endpoint::new(FAKE_URI).with_header("X-Resolution", n.to_string()))
    }
}

