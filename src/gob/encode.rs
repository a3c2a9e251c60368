use std::collections::{HashMap, HashSet};

use super::value::{Gob, Schema, StructSchema, StructValue, Value};
use super::{
    encode_int, encode_uint, GobError, Result, TypeId, BOOL_ID, BYTES_ID, FIRST_USER_ID, INT_ID,
    STRING_ID, UINT_ID,
};

// Field numbers inside Go's bootstrap `wireType` struct.
const WIRE_SLICE: u64 = 2;
const WIRE_STRUCT: u64 = 3;
const WIRE_MAP: u64 = 4;

/// Encoding side of one gob stream. Type definitions are sent once per
/// stream, so a single encoder must be used for everything written to a
/// connection.
#[derive(Debug)]
pub struct Encoder {
    ids: HashMap<&'static str, TypeId>,
    sent: HashSet<TypeId>,
    next_id: TypeId,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            sent: HashSet::new(),
            next_id: FIRST_USER_ID,
        }
    }

    /// Encodes `value` as framed gob messages: any type definitions not yet
    /// sent on this stream, followed by the value itself.
    pub fn encode<T: Gob>(&mut self, value: &T) -> Result<Vec<u8>> {
        let struct_schema = T::schema();
        let schema = Schema::Struct(struct_schema.clone());
        self.assign_ids(&schema);

        let mut out = Vec::new();
        self.send_type(&schema, &mut out)?;

        let mut msg = Vec::new();
        encode_int(&mut msg, self.type_id(&schema)?);
        encode_struct(&struct_schema, &value.to_value(), &mut msg)?;
        write_message(&mut out, &msg);
        Ok(out)
    }

    // Ids are handed out outer type first, then components in field order.
    fn assign_ids(&mut self, schema: &Schema) {
        let Some(name) = schema.defined_name() else {
            return;
        };
        if self.ids.contains_key(name) {
            return;
        }
        self.ids.insert(name, self.next_id);
        self.next_id += 1;
        for child in children(schema) {
            self.assign_ids(child);
        }
    }

    fn type_id(&self, schema: &Schema) -> Result<TypeId> {
        let id = match schema {
            Schema::Bool => BOOL_ID,
            Schema::Int => INT_ID,
            Schema::Uint => UINT_ID,
            Schema::Bytes => BYTES_ID,
            Schema::String => STRING_ID,
            other => {
                let name = other.defined_name().unwrap_or_default();
                *self
                    .ids
                    .get(name)
                    .ok_or(GobError::BadTypeDefinition("type has no assigned id"))?
            }
        };
        Ok(id)
    }

    fn send_type(&mut self, schema: &Schema, out: &mut Vec<u8>) -> Result<()> {
        if schema.defined_name().is_none() {
            return Ok(());
        }
        let id = self.type_id(schema)?;
        if self.sent.contains(&id) {
            return Ok(());
        }

        let mut msg = Vec::new();
        encode_int(&mut msg, -id);
        self.write_wire_type(schema, id, &mut msg)?;
        write_message(out, &msg);
        self.sent.insert(id);

        for child in children(schema) {
            self.send_type(child, out)?;
        }
        Ok(())
    }

    fn write_wire_type(&self, schema: &Schema, id: TypeId, msg: &mut Vec<u8>) -> Result<()> {
        match schema {
            Schema::Struct(s) => {
                encode_uint(msg, WIRE_STRUCT);
                encode_uint(msg, 1);
                write_common(msg, s.name, id);
                if !s.fields.is_empty() {
                    encode_uint(msg, 1);
                    encode_uint(msg, s.fields.len() as u64);
                    for (name, field) in &s.fields {
                        encode_uint(msg, 1);
                        write_bytes(msg, name.as_bytes());
                        encode_uint(msg, 1);
                        encode_int(msg, self.type_id(field)?);
                        encode_uint(msg, 0);
                    }
                }
                encode_uint(msg, 0);
            }
            Schema::Slice { name, elem } => {
                encode_uint(msg, WIRE_SLICE);
                encode_uint(msg, 1);
                write_common(msg, name, id);
                encode_uint(msg, 1);
                encode_int(msg, self.type_id(elem)?);
                encode_uint(msg, 0);
            }
            Schema::Map { name, key, elem } => {
                encode_uint(msg, WIRE_MAP);
                encode_uint(msg, 1);
                write_common(msg, name, id);
                encode_uint(msg, 1);
                encode_int(msg, self.type_id(key)?);
                encode_uint(msg, 1);
                encode_int(msg, self.type_id(elem)?);
                encode_uint(msg, 0);
            }
            _ => return Err(GobError::BadTypeDefinition("builtin types are predefined")),
        }
        encode_uint(msg, 0);
        Ok(())
    }
}

fn children(schema: &Schema) -> Vec<&Schema> {
    match schema {
        Schema::Struct(s) => s.fields.iter().map(|(_, f)| f).collect(),
        Schema::Slice { elem, .. } => vec![elem.as_ref()],
        Schema::Map { key, elem, .. } => vec![key.as_ref(), elem.as_ref()],
        _ => Vec::new(),
    }
}

// CommonType { Name string; Id typeId }
fn write_common(msg: &mut Vec<u8>, name: &str, id: TypeId) {
    if name.is_empty() {
        encode_uint(msg, 2);
    } else {
        encode_uint(msg, 1);
        write_bytes(msg, name.as_bytes());
        encode_uint(msg, 1);
    }
    encode_int(msg, id);
    encode_uint(msg, 0);
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn write_message(out: &mut Vec<u8>, msg: &[u8]) {
    encode_uint(out, msg.len() as u64);
    out.extend_from_slice(msg);
}

fn encode_struct(schema: &StructSchema, value: &StructValue, out: &mut Vec<u8>) -> Result<()> {
    let mut last: i64 = -1;
    for (idx, (name, field)) in schema.fields.iter().enumerate() {
        let Some(v) = value.get(name) else {
            continue;
        };
        if v.is_zero() {
            continue;
        }
        let idx = idx as i64;
        encode_uint(out, (idx - last) as u64);
        last = idx;
        encode_value(field, v, name, out)?;
    }
    encode_uint(out, 0);
    Ok(())
}

fn encode_value(schema: &Schema, value: &Value, field: &str, out: &mut Vec<u8>) -> Result<()> {
    match (schema, value) {
        (Schema::Bool, Value::Bool(b)) => encode_uint(out, *b as u64),
        (Schema::Int, Value::Int(i)) => encode_int(out, *i),
        (Schema::Uint, Value::Uint(u)) => encode_uint(out, *u),
        (Schema::Bytes, Value::Bytes(b)) => write_bytes(out, b),
        (Schema::String, Value::String(s)) => write_bytes(out, s.as_bytes()),
        (Schema::Struct(s), Value::Struct(v)) => encode_struct(s, v, out)?,
        (Schema::Slice { elem, .. }, Value::List(items)) => {
            encode_uint(out, items.len() as u64);
            for item in items {
                encode_value(elem, item, field, out)?;
            }
        }
        (Schema::Map { key, elem, .. }, Value::Map(entries)) => {
            encode_uint(out, entries.len() as u64);
            for (k, v) in entries {
                encode_value(key, k, field, out)?;
                encode_value(elem, v, field, out)?;
            }
        }
        (schema, _) => {
            return Err(GobError::Mismatch {
                field: field.to_string(),
                expected: kind(schema),
            });
        }
    }
    Ok(())
}

fn kind(schema: &Schema) -> &'static str {
    match schema {
        Schema::Bool => "bool",
        Schema::Int => "int",
        Schema::Uint => "uint",
        Schema::Bytes => "bytes",
        Schema::String => "string",
        Schema::Struct(_) => "struct",
        Schema::Slice { .. } => "slice",
        Schema::Map { .. } => "map",
    }
}
