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

/// Message serialization for Gremlin requests and responses
///
/// Request frame layout:
/// - one byte: length of the mime type
/// - the mime type itself (e.g. `application/vnd.gremlin-v3.0+json`)
/// - the JSON request body
///
/// Responses are plain JSON text or binary frames without the mime prefix.
use crate::error::{GremlinError, Result};
use crate::graphson::{GraphSonReader, GraphSonV3Reader};
use crate::message::{Args, Op, Processor, RequestMessage, ResponseMessage};
use serde_json::{Value, json};
use std::sync::Arc;

pub const GRAPHSON_V3_MIME: &str = "application/vnd.gremlin-v3.0+json";

/// Server-side processor as seen by the serializer: which ops it accepts and
/// how their arguments are prepared for the wire.
pub trait OpProcessor: Send + Sync {
    fn processor(&self) -> Processor;

    fn supports(&self, op: Op) -> bool;

    fn prepare(&self, _op: Op, args: Args) -> Result<Args> {
        Ok(args)
    }

    fn process(&self, op: Op, args: Args) -> Result<Args> {
        if !self.supports(op) {
            return Err(GremlinError::UnsupportedOperation {
                processor: self.processor().to_string(),
                op: op.to_string(),
            });
        }
        self.prepare(op, args)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProcessor;

impl OpProcessor for StandardProcessor {
    fn processor(&self) -> Processor {
        Processor::Standard
    }

    fn supports(&self, op: Op) -> bool {
        matches!(op, Op::Authentication | Op::Eval)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraversalProcessor;

impl OpProcessor for TraversalProcessor {
    fn processor(&self) -> Processor {
        Processor::Traversal
    }

    fn supports(&self, op: Op) -> bool {
        matches!(op, Op::Authentication | Op::Bytecode)
    }

    fn prepare(&self, op: Op, mut args: Args) -> Result<Args> {
        if op == Op::Bytecode {
            let has_aliases = args
                .get("aliases")
                .is_some_and(|a| a.as_object().is_some_and(|m| !m.is_empty()));
            if !has_aliases {
                args.insert("aliases".to_string(), json!({ "g": "g" }));
            }
        }
        Ok(args)
    }
}

/// The session processor: `authentication`, `eval` and `close`, all passed
/// through as built.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionProcessor;

impl OpProcessor for SessionProcessor {
    fn processor(&self) -> Processor {
        Processor::Session
    }

    fn supports(&self, op: Op) -> bool {
        matches!(op, Op::Authentication | Op::Eval | Op::Close)
    }
}

pub trait MessageSerializer: Send + Sync {
    fn mime_type(&self) -> &str;

    fn processor(&self, processor: Processor) -> Option<&dyn OpProcessor>;

    fn serialize_message(&self, request: &RequestMessage) -> Result<Vec<u8>>;

    fn deserialize_message(&self, data: &[u8]) -> Result<ResponseMessage>;
}

pub struct GraphSonSerializerV3 {
    reader: Arc<dyn GraphSonReader>,
    processors: Vec<Box<dyn OpProcessor>>,
}

impl Default for GraphSonSerializerV3 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphSonSerializerV3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let processors: Vec<String> = self
            .processors
            .iter()
            .map(|p| p.processor().to_string())
            .collect();
        f.debug_struct("GraphSonSerializerV3")
            .field("processors", &processors)
            .finish_non_exhaustive()
    }
}

impl GraphSonSerializerV3 {
    pub fn new() -> Self {
        Self::with_reader(Arc::new(GraphSonV3Reader))
    }

    /// Standard and traversal processors plus the session processor
    pub fn extended() -> Self {
        Self::new().with_session()
    }

    /// Response data is converted with `reader`
    pub fn with_reader(reader: Arc<dyn GraphSonReader>) -> Self {
        Self {
            reader,
            processors: vec![Box::new(StandardProcessor), Box::new(TraversalProcessor)],
        }
    }

    pub fn with_session(self) -> Self {
        self.with_processor(Box::new(SessionProcessor))
    }

    /// Register a processor, replacing any existing one with the same name
    pub fn with_processor(mut self, processor: Box<dyn OpProcessor>) -> Self {
        self.processors
            .retain(|p| p.processor() != processor.processor());
        self.processors.push(processor);
        self
    }

    fn frame(&self, body: &[u8]) -> Result<Vec<u8>> {
        let mime = self.mime_type().as_bytes();
        let mime_len = u8::try_from(mime.len())
            .map_err(|_| GremlinError::Codec(format!("mime type too long: {}", self.mime_type())))?;

        let mut frame = Vec::with_capacity(1 + mime.len() + body.len());
        frame.push(mime_len);
        frame.extend_from_slice(mime);
        frame.extend_from_slice(body);
        Ok(frame)
    }
}

impl MessageSerializer for GraphSonSerializerV3 {
    fn mime_type(&self) -> &str {
        GRAPHSON_V3_MIME
    }

    fn processor(&self, processor: Processor) -> Option<&dyn OpProcessor> {
        self.processors
            .iter()
            .find(|p| p.processor() == processor)
            .map(|p| &**p)
    }

    fn serialize_message(&self, request: &RequestMessage) -> Result<Vec<u8>> {
        let processor = self
            .processor(request.processor)
            .ok_or_else(|| GremlinError::UnknownProcessor(request.processor.to_string()))?;
        let args = processor.process(request.op, request.args.clone())?;

        let body = json!({
            "requestId": { "@type": "g:UUID", "@value": request.request_id.to_string() },
            "op": request.op.as_str(),
            "processor": request.processor.as_str(),
            "args": Value::Object(args),
        });
        self.frame(&serde_json::to_vec(&body)?)
    }

    fn deserialize_message(&self, data: &[u8]) -> Result<ResponseMessage> {
        let mut response: ResponseMessage = serde_json::from_slice(data)?;
        let data = std::mem::take(&mut response.result.data);
        response.result.data = self.reader.read(data);
        Ok(response)
    }
}

/// Split a request frame into its mime type and JSON body
pub fn split_frame(frame: &[u8]) -> Result<(&str, &[u8])> {
    let (&mime_len, rest) = frame
        .split_first()
        .ok_or_else(|| GremlinError::Codec("empty frame".to_string()))?;
    let mime_len = mime_len as usize;
    if rest.len() < mime_len {
        return Err(GremlinError::Codec(format!(
            "frame claims a {} byte mime type but only {} bytes follow",
            mime_len,
            rest.len()
        )));
    }
    let (mime, body) = rest.split_at(mime_len);
    let mime = std::str::from_utf8(mime)
        .map_err(|_| GremlinError::Codec("mime type is not valid UTF-8".to_string()))?;
    Ok((mime, body))
}
