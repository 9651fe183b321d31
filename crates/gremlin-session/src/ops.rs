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

/// Gremlin request builders
use crate::graphson::GraphSonWriter;
use crate::message::{Args, Bindings, Op, Processor, RequestMessage, RequestOptions};
use crate::session::Session;
use crate::traversal::Bytecode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use uuid::Uuid;

fn aliases(traversal_source: &str) -> Value {
    json!({ "g": traversal_source })
}

/// Non-empty bindings go under `bindings`; request options are merged last so
/// the caller's keys replace the defaults.
fn finish(mut args: Args, bindings: Option<Bindings>, request_options: Option<RequestOptions>) -> Args {
    if let Some(bindings) = bindings.filter(|b| !b.is_empty()) {
        args.insert("bindings".to_string(), Value::Object(bindings));
    }
    if let Some(options) = request_options {
        args.extend(options);
    }
    args
}

pub fn session_eval_request(
    session: &Session,
    gremlin: impl Into<String>,
    traversal_source: &str,
    bindings: Option<Bindings>,
    request_options: Option<RequestOptions>,
) -> RequestMessage {
    let mut args = Args::new();
    args.insert("gremlin".to_string(), Value::String(gremlin.into()));
    args.insert("aliases".to_string(), aliases(traversal_source));
    args.insert("session".to_string(), Value::String(session.id().to_string()));
    args.insert("manageTransaction".to_string(), Value::Bool(false));

    RequestMessage::new(
        Processor::Session,
        Op::Eval,
        finish(args, bindings, request_options),
    )
}

pub fn session_close_request(session: &Session) -> RequestMessage {
    let mut args = Args::new();
    args.insert("session".to_string(), Value::String(session.id().to_string()));
    args.insert("manageTransaction".to_string(), Value::Bool(false));
    args.insert("force".to_string(), Value::Bool(false));

    RequestMessage::new(Processor::Session, Op::Close, args)
}

pub fn eval_request(
    gremlin: impl Into<String>,
    traversal_source: &str,
    bindings: Option<Bindings>,
    request_options: Option<RequestOptions>,
) -> RequestMessage {
    let mut args = Args::new();
    args.insert("gremlin".to_string(), Value::String(gremlin.into()));
    args.insert("aliases".to_string(), aliases(traversal_source));

    RequestMessage::new(
        Processor::Standard,
        Op::Eval,
        finish(args, bindings, request_options),
    )
}

pub fn bytecode_request(
    bytecode: &Bytecode,
    traversal_source: &str,
    writer: &dyn GraphSonWriter,
) -> RequestMessage {
    let mut args = Args::new();
    args.insert("gremlin".to_string(), writer.write_bytecode(bytecode));
    args.insert("aliases".to_string(), aliases(traversal_source));

    RequestMessage::new(Processor::Traversal, Op::Bytecode, args)
}

/// SASL PLAIN answer to a 407 challenge. It reuses the challenged request's
/// id so the server can match it to the pending request.
pub fn authentication_request(
    request_id: Uuid,
    processor: Processor,
    username: &str,
    password: &str,
) -> RequestMessage {
    let mut token = Vec::with_capacity(username.len() + password.len() + 2);
    token.push(0);
    token.extend_from_slice(username.as_bytes());
    token.push(0);
    token.extend_from_slice(password.as_bytes());

    let mut args = Args::new();
    args.insert("sasl".to_string(), Value::String(STANDARD.encode(token)));
    args.insert("saslMechanism".to_string(), Value::String("PLAIN".to_string()));

    RequestMessage {
        request_id,
        processor,
        op: Op::Authentication,
        args,
    }
}
