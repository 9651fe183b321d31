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

//! Integration tests for gremlin-session
//!
//! These tests require a running Gremlin Server on localhost:8182.
//!
//! To run:
//! 1. Start a server (example using Docker):
//!    docker run --rm -p 8182:8182 tinkerpop/gremlin-server:3.7.3
//!
//! 2. Run tests:
//!    cargo test -p gremlin-session --test integration -- --ignored --test-threads=1

#[cfg(test)]
mod real_server_tests {
    use gremlin_session::{ClientOptions, Endpoints, GremlinError, GremlinManager};
    use serde_json::json;

    fn manager() -> GremlinManager {
        GremlinManager::new(Endpoints::default())
    }

    #[tokio::test]
    #[ignore]
    async fn test_sessionless_eval() {
        let manager = manager();
        let client = manager
            .client(ClientOptions::new())
            .await
            .expect("Failed to connect");

        let result = client
            .submit("1 + 2", None, None)
            .await
            .expect("Failed to submit")
            .await
            .expect("Eval failed");
        assert_eq!(result.one(), Some(&json!(3)));

        manager.close().await.expect("Failed to close");
    }

    #[tokio::test]
    #[ignore]
    async fn test_session_keeps_variables() {
        let manager = manager();
        let session = manager
            .sessioned_client(None, ClientOptions::new())
            .await
            .expect("Failed to open session");

        session
            .submit("x = 41", None, None)
            .await
            .expect("Failed to submit")
            .await
            .expect("Assignment failed");
        let result = session
            .submit("x + 1", None, None)
            .await
            .expect("Failed to submit")
            .await
            .expect("Eval failed");
        assert_eq!(result.one(), Some(&json!(42)));

        session.close().await.expect("Failed to close session");
    }

    #[tokio::test]
    #[ignore]
    async fn test_closed_session_forgets_state() {
        let manager = manager();
        let session_id = "gremlin-session-it-reopen".to_string();

        let session = manager
            .sessioned_client(Some(session_id.clone()), ClientOptions::new())
            .await
            .expect("Failed to open session");
        session
            .submit("y = 1", None, None)
            .await
            .expect("Failed to submit")
            .await
            .expect("Assignment failed");
        session.close().await.expect("Failed to close session");

        let reopened = manager
            .sessioned_client(Some(session_id), ClientOptions::new())
            .await
            .expect("Failed to reopen session");
        let err = reopened
            .submit("y", None, None)
            .await
            .expect("Failed to submit")
            .await
            .expect_err("Variable should be gone");
        assert!(matches!(err, GremlinError::Server { .. }));

        manager.close().await.expect("Failed to close");
    }

    #[tokio::test]
    #[ignore]
    async fn test_script_error_is_reported() {
        let manager = manager();
        let client = manager
            .client(ClientOptions::new())
            .await
            .expect("Failed to connect");

        let err = client
            .submit("throw new RuntimeException('boom')", None, None)
            .await
            .expect("Failed to submit")
            .await
            .expect_err("Script should fail");
        match err {
            GremlinError::Server { code, message, .. } => {
                assert_eq!(code, 597);
                assert!(message.contains("boom"), "Unexpected message: {}", message);
            }
            other => panic!("Expected server error, got: {:?}", other),
        }

        manager.close().await.expect("Failed to close");
    }

    #[tokio::test]
    #[ignore]
    async fn test_traversal_round_trip() {
        let manager = manager();
        let g = manager
            .traversal_source(None)
            .await
            .expect("Failed to open traversal source");

        let count = g
            .v(vec![])
            .count()
            .next()
            .await
            .expect("Traversal failed");
        assert!(count.is_some(), "count() always yields a value");

        manager.close().await.expect("Failed to close");
    }
}
