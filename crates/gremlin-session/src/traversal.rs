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

//! Traversal construction helpers
//!
//! A thin bytecode builder over a [`RemoteConnection`]. Steps that have no
//! dedicated method can be added with [`GraphTraversal::step`].
//!
//! ```no_run
//! use gremlin_session::{Endpoint, GremlinManager};
//! use gremlin_session::traversal::GraphTraversalSource;
//! use serde_json::json;
//!
//! # async fn run() -> gremlin_session::Result<()> {
//! let manager = GremlinManager::new(Endpoint::new("ws://localhost:8182/gremlin"));
//! let g: GraphTraversalSource = manager.traversal_source(None).await?;
//! let names = g.v(vec![]).has_label("person").values("name").to_list().await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::RemoteConnection;
use crate::error::Result;
use serde_json::Value;

/// One step or source instruction: an operator and its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub operator: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    sources: Vec<Instruction>,
    steps: Vec<Instruction>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, operator: impl Into<String>, args: Vec<Value>) {
        self.sources.push(Instruction {
            operator: operator.into(),
            args,
        });
    }

    pub fn add_step(&mut self, operator: impl Into<String>, args: Vec<Value>) {
        self.steps.push(Instruction {
            operator: operator.into(),
            args,
        });
    }

    pub fn sources(&self) -> &[Instruction] {
        &self.sources
    }

    pub fn steps(&self) -> &[Instruction] {
        &self.steps
    }
}

/// Entry point for traversals against one remote connection
#[derive(Debug, Clone)]
pub struct GraphTraversalSource {
    connection: RemoteConnection,
    bytecode: Bytecode,
}

impl GraphTraversalSource {
    pub fn new(connection: RemoteConnection) -> Self {
        Self {
            connection,
            bytecode: Bytecode::new(),
        }
    }

    pub fn connection(&self) -> &RemoteConnection {
        &self.connection
    }

    /// Add a source instruction (e.g. `withSideEffect`) to every traversal
    /// spawned from the returned source
    pub fn with_source(&self, operator: impl Into<String>, args: Vec<Value>) -> Self {
        let mut source = self.clone();
        source.bytecode.add_source(operator, args);
        source
    }

    fn spawn(&self, operator: &str, args: Vec<Value>) -> GraphTraversal {
        let mut bytecode = self.bytecode.clone();
        bytecode.add_step(operator, args);
        GraphTraversal {
            connection: self.connection.clone(),
            bytecode,
        }
    }

    pub fn v(&self, ids: Vec<Value>) -> GraphTraversal {
        self.spawn("V", ids)
    }

    pub fn e(&self, ids: Vec<Value>) -> GraphTraversal {
        self.spawn("E", ids)
    }

    pub fn add_v(&self, label: impl Into<String>) -> GraphTraversal {
        self.spawn("addV", vec![Value::String(label.into())])
    }
}

/// A traversal under construction
#[derive(Debug, Clone)]
pub struct GraphTraversal {
    connection: RemoteConnection,
    bytecode: Bytecode,
}

impl GraphTraversal {
    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    pub fn step(mut self, operator: impl Into<String>, args: Vec<Value>) -> Self {
        self.bytecode.add_step(operator, args);
        self
    }

    pub fn has(self, key: impl Into<String>, value: Value) -> Self {
        self.step("has", vec![Value::String(key.into()), value])
    }

    pub fn has_label(self, label: impl Into<String>) -> Self {
        self.step("hasLabel", vec![Value::String(label.into())])
    }

    pub fn limit(self, count: i64) -> Self {
        self.step("limit", vec![Value::from(count)])
    }

    pub fn values(self, key: impl Into<String>) -> Self {
        self.step("values", vec![Value::String(key.into())])
    }

    pub fn property(self, key: impl Into<String>, value: Value) -> Self {
        self.step("property", vec![Value::String(key.into()), value])
    }

    pub fn count(self) -> Self {
        self.step("count", vec![])
    }

    pub fn id(self) -> Self {
        self.step("id", vec![])
    }

    pub fn value_map(self) -> Self {
        self.step("valueMap", vec![])
    }

    /// Run the traversal and collect every result
    pub async fn to_list(self) -> Result<Vec<Value>> {
        let results = self.connection.submit(&self.bytecode).await?.await?;
        Ok(results.into_data())
    }

    /// Run the traversal and return the first result
    pub async fn next(self) -> Result<Option<Value>> {
        Ok(self.to_list().await?.into_iter().next())
    }

    /// Run the traversal for its side effects
    pub async fn iterate(self) -> Result<()> {
        self.to_list().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytecode_keeps_step_order() {
        let mut bytecode = Bytecode::new();
        bytecode.add_step("V", vec![]);
        bytecode.add_step("hasLabel", vec![json!("person")]);
        bytecode.add_step("limit", vec![json!(2)]);

        let operators: Vec<&str> = bytecode.steps().iter().map(|s| s.operator.as_str()).collect();
        assert_eq!(operators, vec!["V", "hasLabel", "limit"]);
        assert!(bytecode.sources().is_empty());
    }
}
