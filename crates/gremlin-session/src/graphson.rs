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

/// GraphSON 3.0 value typing
///
/// Only the envelope-level types the driver itself produces or commonly
/// receives are handled. Typed values the reader does not know are passed
/// through unchanged as `{"@type": .., "@value": ..}` objects.
use crate::traversal::{Bytecode, Instruction};
use serde_json::{Map, Value, json};

pub trait GraphSonReader: Send + Sync {
    /// Convert a typed GraphSON value into plain JSON
    fn read(&self, value: Value) -> Value;
}

pub trait GraphSonWriter: Send + Sync {
    /// Convert plain JSON into typed GraphSON
    fn write(&self, value: &Value) -> Value;

    fn write_bytecode(&self, bytecode: &Bytecode) -> Value {
        let steps: Vec<Value> = bytecode
            .steps()
            .iter()
            .map(|step| self.write_instruction(step))
            .collect();

        let mut body = Map::new();
        if !bytecode.sources().is_empty() {
            let sources = bytecode
                .sources()
                .iter()
                .map(|source| self.write_instruction(source))
                .collect();
            body.insert("source".to_string(), Value::Array(sources));
        }
        body.insert("step".to_string(), Value::Array(steps));
        typed("g:Bytecode", Value::Object(body))
    }

    fn write_instruction(&self, instruction: &Instruction) -> Value {
        let mut parts = Vec::with_capacity(instruction.args.len() + 1);
        parts.push(Value::String(instruction.operator.clone()));
        parts.extend(instruction.args.iter().map(|arg| self.write(arg)));
        Value::Array(parts)
    }
}

fn typed(type_name: &str, value: Value) -> Value {
    json!({ "@type": type_name, "@value": value })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSonV3Writer;

impl GraphSonWriter for GraphSonV3Writer {
    fn write(&self, value: &Value) -> Value {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i32::try_from(i).is_ok() {
                        typed("g:Int32", Value::Number(n.clone()))
                    } else {
                        typed("g:Int64", Value::Number(n.clone()))
                    }
                } else if n.is_u64() {
                    typed("g:Int64", Value::Number(n.clone()))
                } else {
                    typed("g:Double", Value::Number(n.clone()))
                }
            }
            Value::Array(items) => typed(
                "g:List",
                Value::Array(items.iter().map(|item| self.write(item)).collect()),
            ),
            Value::Object(map) => {
                if map.contains_key("@type") {
                    return value.clone();
                }
                let mut flat = Vec::with_capacity(map.len() * 2);
                for (k, v) in map {
                    flat.push(Value::String(k.clone()));
                    flat.push(self.write(v));
                }
                typed("g:Map", Value::Array(flat))
            }
            Value::Null | Value::Bool(_) | Value::String(_) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSonV3Reader;

/// Types whose `@value` is already plain JSON
const SCALAR_TYPES: &[&str] = &[
    "g:Int32",
    "g:Int64",
    "g:Double",
    "g:Float",
    "g:UUID",
    "g:Date",
    "g:Timestamp",
    "g:T",
    "g:Direction",
];

/// JSON object keys must be strings; non-string keys use their JSON text
fn map_key(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// The `@value` of a `g:Traverser`, or the value itself when it is something else
fn traverser_payload(value: Value) -> std::result::Result<Value, Value> {
    match value {
        Value::Object(mut map)
            if map.get("@type").and_then(Value::as_str) == Some("g:Traverser") =>
        {
            Ok(map.remove("@value").unwrap_or(Value::Null))
        }
        other => Err(other),
    }
}

impl GraphSonV3Reader {
    fn read_list(&self, inner: Value) -> Value {
        match inner {
            Value::Array(items) => self.read_items(items),
            other => other,
        }
    }

    /// Reads list members, expanding each traverser into `bulk` copies of its value
    fn read_items(&self, items: Vec<Value>) -> Value {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match traverser_payload(item) {
                Ok(payload) => {
                    let (value, bulk) = self.read_traverser(payload);
                    out.extend(std::iter::repeat_n(value, bulk));
                }
                Err(item) => out.push(self.read(item)),
            }
        }
        Value::Array(out)
    }

    fn read_traverser(&self, payload: Value) -> (Value, usize) {
        let Value::Object(mut fields) = payload else {
            return (self.read(payload), 1);
        };
        let bulk = fields
            .remove("bulk")
            .map(|bulk| self.read(bulk))
            .and_then(|bulk| bulk.as_u64())
            .and_then(|bulk| usize::try_from(bulk).ok())
            .unwrap_or(1)
            .max(1);
        let value = fields
            .remove("value")
            .map(|value| self.read(value))
            .unwrap_or(Value::Null);
        (value, bulk)
    }

    fn read_map(&self, inner: Value) -> Value {
        match inner {
            Value::Array(flat) if flat.len() % 2 != 0 => {
                tracing::warn!(
                    entries = flat.len(),
                    "g:Map payload has a dangling key; leaving it undecoded"
                );
                typed("g:Map", Value::Array(flat))
            }
            Value::Array(flat) => {
                let mut map = Map::new();
                let mut iter = flat.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    map.insert(map_key(self.read(k)), self.read(v));
                }
                Value::Object(map)
            }
            other => other,
        }
    }
}

impl GraphSonReader for GraphSonV3Reader {
    fn read(&self, value: Value) -> Value {
        match value {
            Value::Object(mut map) => {
                let type_name = match (map.get("@type"), map.contains_key("@value")) {
                    (Some(Value::String(name)), true) => Some(name.clone()),
                    _ => None,
                };

                match type_name.as_deref() {
                    Some(name) if SCALAR_TYPES.contains(&name) => {
                        map.remove("@value").unwrap_or(Value::Null)
                    }
                    Some("g:List") | Some("g:Set") => {
                        self.read_list(map.remove("@value").unwrap_or(Value::Null))
                    }
                    Some("g:Map") => self.read_map(map.remove("@value").unwrap_or(Value::Null)),
                    Some("g:Traverser") => {
                        self.read_traverser(map.remove("@value").unwrap_or(Value::Null)).0
                    }
                    Some(_) => Value::Object(map),
                    None => Value::Object(
                        map.into_iter()
                            .map(|(k, v)| (k, self.read(v)))
                            .collect(),
                    ),
                }
            }
            Value::Array(items) => self.read_items(items),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_types_numbers_by_width() {
        let writer = GraphSonV3Writer;
        assert_eq!(writer.write(&json!(1)), json!({"@type": "g:Int32", "@value": 1}));
        assert_eq!(
            writer.write(&json!(5_000_000_000i64)),
            json!({"@type": "g:Int64", "@value": 5_000_000_000i64})
        );
        assert_eq!(writer.write(&json!(1.5)), json!({"@type": "g:Double", "@value": 1.5}));
        assert_eq!(writer.write(&json!("x")), json!("x"));
    }

    #[test]
    fn writer_flattens_maps() {
        let written = GraphSonV3Writer.write(&json!({"name": "marko"}));
        assert_eq!(written, json!({"@type": "g:Map", "@value": ["name", "marko"]}));
    }

    #[test]
    fn bytecode_is_typed() {
        let mut bytecode = Bytecode::new();
        bytecode.add_step("V", vec![]);
        bytecode.add_step("limit", vec![json!(1)]);

        let written = GraphSonV3Writer.write_bytecode(&bytecode);
        assert_eq!(
            written,
            json!({
                "@type": "g:Bytecode",
                "@value": {"step": [["V"], ["limit", {"@type": "g:Int32", "@value": 1}]]}
            })
        );
    }

    #[test]
    fn reader_unwraps_nested_collections() {
        let typed = json!({
            "@type": "g:List",
            "@value": [
                {"@type": "g:Map", "@value": [
                    "age", {"@type": "g:Int32", "@value": 29},
                    {"@type": "g:T", "@value": "id"}, {"@type": "g:Int64", "@value": 1}
                ]}
            ]
        });

        assert_eq!(GraphSonV3Reader.read(typed), json!([{"age": 29, "id": 1}]));
    }

    #[test]
    fn reader_keeps_unknown_types() {
        let vertex = json!({"@type": "g:Vertex", "@value": {"id": 1, "label": "person"}});
        assert_eq!(GraphSonV3Reader.read(vertex.clone()), vertex);
    }

    #[test]
    fn reader_expands_traversers_by_bulk() {
        let traversers = json!({
            "@type": "g:List",
            "@value": [
                {"@type": "g:Traverser", "@value": {
                    "bulk": {"@type": "g:Int64", "@value": 2},
                    "value": "marko"
                }},
                {"@type": "g:Traverser", "@value": {
                    "bulk": {"@type": "g:Int64", "@value": 1},
                    "value": {"@type": "g:Int32", "@value": 29}
                }}
            ]
        });

        assert_eq!(GraphSonV3Reader.read(traversers), json!(["marko", "marko", 29]));
    }

    #[test]
    fn lone_traverser_reads_as_its_value() {
        let traverser = json!({"@type": "g:Traverser", "@value": {"value": "ada"}});
        assert_eq!(GraphSonV3Reader.read(traverser), json!("ada"));
    }

    #[test]
    fn odd_length_map_is_left_undecoded() {
        let dangling = json!({"@type": "g:Map", "@value": ["name", "marko", "age"]});
        assert_eq!(GraphSonV3Reader.read(dangling.clone()), dangling);
    }

    #[test]
    fn reader_and_writer_agree_on_plain_values() {
        let plain = json!({"names": ["a", "b"], "count": 2});
        let read = GraphSonV3Reader.read(GraphSonV3Writer.write(&plain));
        assert_eq!(read, plain);
    }
}
