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

//! Sessioned evaluation against a Gremlin Server
//!
//! Start a server first:
//! ```bash
//! docker run --rm -p 8182:8182 tinkerpop/gremlin-server:3.7.3
//! ```
//!
//! Then run this example (set `GREMLIN_HOST` / `GREMLIN_PORT` or write a
//! `gremlin.toml` to point elsewhere):
//! ```bash
//! RUST_LOG=gremlin_session=debug cargo run -p gremlin-session --example simple_eval
//! ```

use gremlin_session::{ClientOptions, Endpoints, GremlinManager, Result};
use serde_json::{Map, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let endpoints = Endpoints::load()?;
    println!("Connecting to {}...", endpoints.uri());
    let manager = GremlinManager::new(endpoints);

    let session = manager
        .sessioned_client(None, ClientOptions::new().with_show_endpoint(true))
        .await?;
    println!("✓ Session opened: {}", session.session_id());

    println!("\nDefining a variable: answer = 40");
    session.submit("answer = 40", None, None).await?.await?;

    println!("\nUsing it with a binding: answer + extra");
    let mut bindings = Map::new();
    bindings.insert("extra".to_string(), json!(2));
    let result = session
        .submit("answer + extra", Some(bindings), None)
        .await?
        .await?;
    println!("✓ Result: {:?}", result.one());

    let outcome = session
        .clone()
        .scoped(|s| async move {
            s.submit("g.addV('person').property('name', 'ada')", None, None)
                .await?
                .await?;
            let count = s.submit("g.V().hasLabel('person').count()", None, None).await?.await?;
            Ok(count.into_data())
        })
        .await?;
    println!("✓ People in the graph: {:?}", outcome);

    manager.close().await?;
    println!("\n✓ All sessions closed");

    Ok(())
}
