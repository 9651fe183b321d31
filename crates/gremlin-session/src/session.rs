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

use crate::connection::Client;
use crate::error::{GremlinError, Result};
use crate::message::{Bindings, Message, RequestOptions};
use crate::ops::{session_close_request, session_eval_request};
use crate::pool::ResponseFuture;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Identifies a server-side session
///
/// **`Deserialize` is intentionally NOT implemented**: session ids come from
/// [`Session::generate`] or from the caller of
/// [`crate::GremlinManager::sessioned_client`], never from untrusted data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Session {
    id: String,
}

impl Session {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// A random 128-bit id rendered as 32 hex characters
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }

    /// Use the caller's id, or generate one when there is none
    pub fn from_caller(id: Option<String>) -> Result<Self> {
        match id {
            None => Ok(Self::generate()),
            Some(id) if id.trim().is_empty() => Err(GremlinError::InvalidSessionId(
                "session id must not be empty".to_string(),
            )),
            Some(id) => Ok(Self::new(id)),
        }
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Local view of the session's lifecycle. The server opens the session on
/// the first eval, so there is no opening state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Closing,
    Closed,
}

struct SessionInner {
    client: Client,
    session: Session,
    state: Mutex<SessionState>,
    // Held for the whole close sequence so a concurrent close waits for it
    close_gate: tokio::sync::Mutex<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let state = *self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state == SessionState::Active {
            tracing::warn!(
                session = %self.session,
                "sessioned client dropped without close; server-side session left open"
            );
        }
    }
}

/// A client bound to one server-side session.
///
/// Every script runs through the session processor with the session id and
/// `manageTransaction: false`, so state and transactions persist across
/// requests until [`SessionedClient::close`]. Cloning is cheap; all clones
/// share the session.
///
/// With the default pool of one connection all requests for the session go
/// over the same physical connection, one at a time. A larger pool allows
/// concurrent requests on different connections, with no ordering between
/// them.
#[derive(Clone)]
pub struct SessionedClient {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for SessionedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionedClient")
            .field("session", &self.inner.session.id())
            .field("state", &self.state())
            .field("client", &self.inner.client)
            .finish()
    }
}

impl SessionedClient {
    pub fn new(client: Client, session: Session) -> Self {
        if client.pool_size() > 1 {
            tracing::warn!(
                session = %session,
                pool_size = client.pool_size(),
                "session pool has more than one connection; requests may reach the server out of order"
            );
        }
        Self {
            inner: Arc::new(SessionInner {
                client,
                session,
                state: Mutex::new(SessionState::Active),
                close_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn session_id(&self) -> &str {
        self.inner.session.id()
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    pub fn is_closed(&self) -> bool {
        self.state() != SessionState::Active
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        *self.lock_state() = state;
    }

    /// Submit a script to the session.
    ///
    /// Only script text is accepted; anything else fails with
    /// [`GremlinError::UnsupportedMessageType`] before a connection is
    /// acquired. `request_options` are merged last and win over the defaults.
    /// Returns once the request is written.
    pub async fn submit(
        &self,
        message: impl Into<Message>,
        bindings: Option<Bindings>,
        request_options: Option<RequestOptions>,
    ) -> Result<ResponseFuture> {
        let gremlin = match message.into() {
            Message::Script(gremlin) => gremlin,
            other => return Err(GremlinError::UnsupportedMessageType(other.kind())),
        };

        if self.state() != SessionState::Active {
            return Err(GremlinError::SessionClosed(self.session_id().to_string()));
        }

        let request = session_eval_request(
            &self.inner.session,
            gremlin,
            self.inner.client.traversal_source(),
            bindings,
            request_options,
        );
        self.inner.client.write(request).await
    }

    /// Close the server-side session, then the pool.
    ///
    /// Waits for the server to acknowledge the close before releasing the
    /// pool. Only the first call sends anything; later calls return `Ok(())`
    /// once that first close has finished. The pool is released even if the
    /// close request fails, and the close request's error is reported first.
    pub async fn close(&self) -> Result<()> {
        let _gate = self.inner.close_gate.lock().await;
        {
            let mut state = self.lock_state();
            if *state != SessionState::Active {
                return Ok(());
            }
            *state = SessionState::Closing;
        }

        tracing::debug!(session = %self.inner.session, "closing session");
        let acknowledged = self.send_close().await;
        let released = self.inner.client.close().await;
        self.set_state(SessionState::Closed);

        if let Err(ref e) = acknowledged {
            tracing::warn!(session = %self.inner.session, error = %e, "session close was not acknowledged");
        }
        acknowledged.and(released)
    }

    async fn send_close(&self) -> Result<()> {
        let request = session_close_request(&self.inner.session);
        let response = self.inner.client.write(request).await?;
        response.await.map(|_| ())
    }

    /// Run `f` with this session and close it afterwards, whether `f`
    /// succeeded or not.
    ///
    /// `f`'s error takes precedence over a close error.
    pub async fn scoped<F, Fut, T>(self, f: F) -> Result<T>
    where
        F: FnOnce(SessionedClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = f(self.clone()).await;
        let closed = self.close().await;

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_error)) => {
                tracing::warn!(
                    session = %self.inner.session,
                    error = %close_error,
                    "close failed after scoped work failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ordering() {
        let session_a = Session::new("aaa");
        let session_b = Session::new("bbb");

        assert!(session_a < session_b);
        let mut sessions = [session_b.clone(), session_a.clone()];
        sessions.sort();
        assert_eq!(sessions[0].id(), "aaa");
    }

    #[test]
    fn test_session_serialization() {
        let session = Session::new("test-session-123");
        let json = serde_json::to_string(&session).expect("Failed to serialize");
        assert!(json.contains("test-session-123"));
    }

    #[test]
    fn generated_ids_are_128_bit_hex() {
        let first = Session::generate();
        let second = Session::generate();

        assert_ne!(first, second);
        assert_eq!(first.id().len(), 32);
        assert!(first.id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn caller_ids_are_kept_but_must_not_be_empty() {
        let session = Session::from_caller(Some("mine".to_string())).expect("valid id");
        assert_eq!(session.id(), "mine");

        let err = Session::from_caller(Some("  ".to_string())).expect_err("blank id");
        assert!(err.is_usage_error());
    }
}
