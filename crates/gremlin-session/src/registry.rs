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

//! Registry of everything a manager has opened

use crate::connection::{Client, RemoteConnection};
use crate::error::{GremlinError, Result};
use crate::session::SessionedClient;
use futures::future::BoxFuture;
use std::sync::{Mutex, PoisonError};

/// Something the registry can shut down
pub trait Closeable: Send + Sync {
    fn close(&self) -> BoxFuture<'_, Result<()>>;

    /// Short description used when reporting close failures
    fn describe(&self) -> String;
}

impl Closeable for Client {
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(Client::close(self))
    }

    fn describe(&self) -> String {
        format!("client {}", self.uri())
    }
}

impl Closeable for RemoteConnection {
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(RemoteConnection::close(self))
    }

    fn describe(&self) -> String {
        format!("remote connection {}", self.client().uri())
    }
}

impl Closeable for SessionedClient {
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(SessionedClient::close(self))
    }

    fn describe(&self) -> String {
        format!("session {}", self.session_id())
    }
}

/// Ordered, append-only list of open resources, owned by one manager
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<Vec<Box<dyn Closeable>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, resource: Box<dyn Closeable>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every registered resource in registration order.
    ///
    /// A failing close does not stop the drain; all failures are returned
    /// together. The registry is empty afterwards, so calling this again only
    /// closes what was registered since.
    pub async fn close_all(&self) -> Result<()> {
        let entries = std::mem::take(
            &mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let mut failures = Vec::new();
        for entry in entries {
            if let Err(e) = entry.close().await {
                tracing::warn!(resource = %entry.describe(), error = %e, "failed to close");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(GremlinError::CloseFailed(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Closeable for Counting {
        fn close(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                self.closes.fetch_add(1, Ordering::SeqCst);
                if self.fail {
                    Err(GremlinError::Protocol("close rejected".to_string()))
                } else {
                    Ok(())
                }
            })
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn drain_continues_past_failures() {
        let closes = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        for fail in [false, true, false] {
            registry.register(Box::new(Counting {
                closes: closes.clone(),
                fail,
            }));
        }

        let err = registry.close_all().await.expect_err("one close failed");
        assert!(matches!(err, GremlinError::CloseFailed(ref failures) if failures.len() == 1));
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn second_drain_is_a_no_op() {
        let closes = Arc::new(AtomicUsize::new(0));
        let registry = ConnectionRegistry::new();
        registry.register(Box::new(Counting {
            closes: closes.clone(),
            fail: false,
        }));

        registry.close_all().await.expect("first drain");
        registry.close_all().await.expect("second drain");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
