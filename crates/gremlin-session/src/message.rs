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

use crate::traversal::Bytecode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Request arguments, keyed by wire name
pub type Args = Map<String, Value>;

/// Script parameter bindings sent under the `bindings` argument
pub type Bindings = Map<String, Value>;

/// Caller overrides merged over the built arguments
pub type RequestOptions = Map<String, Value>;

/// Server-side handler category a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Processor {
    /// The unnamed processor that evaluates sessionless scripts
    #[default]
    Standard,
    Traversal,
    Session,
}

impl Processor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Processor::Standard => "",
            Processor::Traversal => "traversal",
            Processor::Session => "session",
        }
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Processor::Standard => f.write_str("standard"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eval,
    Close,
    Authentication,
    Bytecode,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eval => "eval",
            Op::Close => "close",
            Op::Authentication => "authentication",
            Op::Bytecode => "bytecode",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed request envelope, serialized by a [`crate::MessageSerializer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub request_id: Uuid,
    pub processor: Processor,
    pub op: Op,
    pub args: Args,
}

impl RequestMessage {
    pub fn new(processor: Processor, op: Op, args: Args) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            processor,
            op,
            args,
        }
    }

    /// Look up a single argument by wire name
    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

/// Anything a client can be asked to submit
#[derive(Debug, Clone)]
pub enum Message {
    Script(String),
    Bytecode(Bytecode),
    Request(RequestMessage),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Script(_) => "script",
            Message::Bytecode(_) => "bytecode",
            Message::Request(_) => "request message",
        }
    }
}

impl From<&str> for Message {
    fn from(script: &str) -> Self {
        Message::Script(script.to_string())
    }
}

impl From<String> for Message {
    fn from(script: String) -> Self {
        Message::Script(script)
    }
}

impl From<Bytecode> for Message {
    fn from(bytecode: Bytecode) -> Self {
        Message::Bytecode(bytecode)
    }
}

impl From<RequestMessage> for Message {
    fn from(request: RequestMessage) -> Self {
        Message::Request(request)
    }
}

/// Status codes the driver reacts to
pub mod status {
    pub const SUCCESS: u16 = 200;
    pub const NO_CONTENT: u16 = 204;
    pub const PARTIAL_CONTENT: u16 = 206;
    pub const AUTHENTICATE: u16 = 407;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Status {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResponseResult {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// One decoded response frame. A request may be answered by several frames
/// when the server streams partial content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseMessage {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<Uuid>,
    pub status: Status,
    #[serde(default)]
    pub result: ResponseResult,
}

/// All frames of a completed request, flattened
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub request_id: Uuid,
    pub data: Vec<Value>,
    pub attributes: Map<String, Value>,
}

impl ResultSet {
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            data: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Append one frame's `result.data`, unrolling lists
    pub fn extend_from(&mut self, data: Value) {
        match data {
            Value::Array(items) => self.data.extend(items),
            Value::Null => {}
            other => self.data.push(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// First result, if any
    pub fn one(&self) -> Option<&Value> {
        self.data.first()
    }

    pub fn into_data(self) -> Vec<Value> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_processor_has_empty_wire_name() {
        assert_eq!(Processor::Standard.as_str(), "");
        assert_eq!(Processor::Session.as_str(), "session");
        assert_eq!(Processor::Standard.to_string(), "standard");
    }

    #[test]
    fn script_conversions() {
        assert!(matches!(Message::from("g.V()"), Message::Script(s) if s == "g.V()"));
        let request = RequestMessage::new(Processor::Session, Op::Close, Args::new());
        assert_eq!(Message::from(request).kind(), "request message");
    }

    #[test]
    fn result_set_unrolls_lists() {
        let mut results = ResultSet::new(Uuid::new_v4());
        results.extend_from(json!([1, 2]));
        results.extend_from(json!(3));
        results.extend_from(Value::Null);
        assert_eq!(results.data, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(results.one(), Some(&json!(1)));
    }

    #[test]
    fn decode_response_without_result() {
        let response: ResponseMessage = serde_json::from_value(json!({
            "requestId": "41d2e28a-20a4-4ab0-b379-d810dede3786",
            "status": {"code": 204, "message": "", "attributes": {}}
        }))
        .expect("decoding failed");

        assert_eq!(response.status.code, status::NO_CONTENT);
        assert!(response.result.data.is_null());
        assert!(response.request_id.is_some());
    }
}
