use std::collections::HashMap;

use super::value::{StructValue, Value};
use super::{
    decode_uint, unfold_int, GobError, Result, TypeId, BOOL_ID, BYTES_ID, COMPLEX_ID, FLOAT_ID,
    INTERFACE_ID, INT_ID, STRING_ID, UINT_ID,
};

/// A type definition received from the peer.
#[derive(Debug, Clone)]
enum WireType {
    Array { elem: TypeId, len: i64 },
    Slice { elem: TypeId },
    Struct { name: String, fields: Vec<(String, TypeId)> },
    Map { key: TypeId, elem: TypeId },
    // GobEncoder, BinaryMarshaler and TextMarshaler types travel as opaque bytes.
    Opaque,
}

/// Decoding side of one gob stream. Remembers every type definition the
/// peer sends and decodes values into the dynamic [`Value`] model.
#[derive(Debug, Default)]
pub struct Decoder {
    types: HashMap<TypeId, WireType>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the body of one message (without its length prefix).
    /// Returns `None` when the message was a type definition.
    pub fn decode_message(&mut self, msg: &[u8]) -> Result<Option<Value>> {
        let mut r = Reader::new(msg);
        let id = r.read_int()?;

        if id < 0 {
            let id = -id;
            if self.types.contains_key(&id) {
                return Err(GobError::DuplicateType(id));
            }
            let wire = read_wire_type(&mut r)?;
            r.finish()?;
            tracing::trace!(id, ?wire, "gob type definition");
            self.types.insert(id, wire);
            return Ok(None);
        }

        let value = if matches!(self.types.get(&id), Some(WireType::Struct { .. })) {
            self.read_value(&mut r, id)?
        } else {
            if r.read_uint()? != 0 {
                return Err(GobError::BadSingleton);
            }
            self.read_value(&mut r, id)?
        };
        r.finish()?;
        Ok(Some(value))
    }

    fn read_value(&self, r: &mut Reader<'_>, id: TypeId) -> Result<Value> {
        let value = match id {
            BOOL_ID => Value::Bool(r.read_uint()? != 0),
            INT_ID => Value::Int(r.read_int()?),
            UINT_ID => Value::Uint(r.read_uint()?),
            FLOAT_ID => Value::Float(r.read_float()?),
            COMPLEX_ID => {
                let re = r.read_float()?;
                let im = r.read_float()?;
                Value::Complex(re, im)
            }
            BYTES_ID => Value::Bytes(r.read_bytes()?.to_vec()),
            STRING_ID => Value::String(r.read_string()?),
            INTERFACE_ID => return Err(GobError::Unsupported("interface values")),
            _ => match self.types.get(&id).ok_or(GobError::UnknownType(id))? {
                WireType::Struct { name, fields } => {
                    Value::Struct(self.read_struct(r, name, fields)?)
                }
                WireType::Slice { elem } => {
                    let count = r.read_count()?;
                    let mut items = Vec::with_capacity(count);
                    for _ in 0..count {
                        items.push(self.read_value(r, *elem)?);
                    }
                    Value::List(items)
                }
                WireType::Array { elem, len } => {
                    let count = r.read_count()?;
                    if count as i64 != *len {
                        return Err(GobError::BadTypeDefinition("array length mismatch"));
                    }
                    let mut items = Vec::with_capacity(count);
                    for _ in 0..count {
                        items.push(self.read_value(r, *elem)?);
                    }
                    Value::List(items)
                }
                WireType::Map { key, elem } => {
                    let count = r.read_count()?;
                    let mut entries = Vec::with_capacity(count);
                    for _ in 0..count {
                        let k = self.read_value(r, *key)?;
                        let v = self.read_value(r, *elem)?;
                        entries.push((k, v));
                    }
                    Value::Map(entries)
                }
                WireType::Opaque => Value::Bytes(r.read_bytes()?.to_vec()),
            },
        };
        Ok(value)
    }

    fn read_struct(
        &self,
        r: &mut Reader<'_>,
        name: &str,
        fields: &[(String, TypeId)],
    ) -> Result<StructValue> {
        let mut value = StructValue::new();
        let mut field: i64 = -1;
        loop {
            let delta = r.read_uint()?;
            if delta == 0 {
                return Ok(value);
            }
            field = field.saturating_add(delta.min(i64::MAX as u64) as i64);
            let (field_name, field_id) = usize::try_from(field)
                .ok()
                .and_then(|i| fields.get(i))
                .ok_or_else(|| GobError::FieldOutOfRange {
                    name: name.to_string(),
                    field,
                })?;
            let v = self.read_value(r, *field_id)?;
            value.insert(field_name, v);
        }
    }
}

/// Walks the `(delta, value)` pairs of a struct encoding, handing each field
/// number to `on_field` to consume its value.
fn walk_struct<'a>(
    r: &mut Reader<'a>,
    mut on_field: impl FnMut(&mut Reader<'a>, i64) -> Result<()>,
) -> Result<()> {
    let mut field: i64 = -1;
    loop {
        let delta = r.read_uint()?;
        if delta == 0 {
            return Ok(());
        }
        if delta > 16 {
            return Err(GobError::BadTypeDefinition("field delta out of range"));
        }
        field += delta as i64;
        on_field(r, field)?;
    }
}

// CommonType { Name string; Id typeId }
fn read_common(r: &mut Reader<'_>) -> Result<String> {
    let mut name = String::new();
    walk_struct(r, |r, field| {
        match field {
            0 => name = r.read_string()?,
            1 => {
                r.read_int()?;
            }
            _ => return Err(GobError::BadTypeDefinition("unknown CommonType field")),
        }
        Ok(())
    })?;
    Ok(name)
}

fn read_wire_type(r: &mut Reader<'_>) -> Result<WireType> {
    let mut wire = None;
    walk_struct(r, |r, field| {
        wire = Some(match field {
            0 => read_array_type(r)?,
            1 => read_slice_type(r)?,
            2 => read_struct_type(r)?,
            3 => read_map_type(r)?,
            4..=6 => {
                read_common(r)?;
                WireType::Opaque
            }
            _ => return Err(GobError::BadTypeDefinition("unknown wireType field")),
        });
        Ok(())
    })?;
    wire.ok_or(GobError::BadTypeDefinition("empty wireType"))
}

fn read_array_type(r: &mut Reader<'_>) -> Result<WireType> {
    let (mut elem, mut len) = (0, 0);
    walk_struct(r, |r, field| {
        match field {
            0 => {
                read_common(r)?;
            }
            1 => elem = r.read_int()?,
            2 => len = r.read_int()?,
            _ => return Err(GobError::BadTypeDefinition("unknown arrayType field")),
        }
        Ok(())
    })?;
    Ok(WireType::Array { elem, len })
}

fn read_slice_type(r: &mut Reader<'_>) -> Result<WireType> {
    let mut elem = 0;
    walk_struct(r, |r, field| {
        match field {
            0 => {
                read_common(r)?;
            }
            1 => elem = r.read_int()?,
            _ => return Err(GobError::BadTypeDefinition("unknown sliceType field")),
        }
        Ok(())
    })?;
    Ok(WireType::Slice { elem })
}

fn read_struct_type(r: &mut Reader<'_>) -> Result<WireType> {
    let mut name = String::new();
    let mut fields = Vec::new();
    walk_struct(r, |r, field| {
        match field {
            0 => name = read_common(r)?,
            1 => {
                let count = r.read_count()?;
                for _ in 0..count {
                    fields.push(read_field_type(r)?);
                }
            }
            _ => return Err(GobError::BadTypeDefinition("unknown structType field")),
        }
        Ok(())
    })?;
    Ok(WireType::Struct { name, fields })
}

// fieldType { Name string; Id typeId }
fn read_field_type(r: &mut Reader<'_>) -> Result<(String, TypeId)> {
    let mut name = String::new();
    let mut id = 0;
    walk_struct(r, |r, field| {
        match field {
            0 => name = r.read_string()?,
            1 => id = r.read_int()?,
            _ => return Err(GobError::BadTypeDefinition("unknown fieldType field")),
        }
        Ok(())
    })?;
    Ok((name, id))
}

fn read_map_type(r: &mut Reader<'_>) -> Result<WireType> {
    let (mut key, mut elem) = (0, 0);
    walk_struct(r, |r, field| {
        match field {
            0 => {
                read_common(r)?;
            }
            1 => key = r.read_int()?,
            2 => elem = r.read_int()?,
            _ => return Err(GobError::BadTypeDefinition("unknown mapType field")),
        }
        Ok(())
    })?;
    Ok(WireType::Map { key, elem })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(GobError::TrailingBytes(n)),
        }
    }

    fn read_uint(&mut self) -> Result<u64> {
        let (value, used) = decode_uint(&self.buf[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    fn read_int(&mut self) -> Result<i64> {
        Ok(unfold_int(self.read_uint()?))
    }

    fn read_float(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_uint()?.swap_bytes()))
    }

    /// An element count, bounded by the bytes left since every element
    /// occupies at least one byte.
    fn read_count(&mut self) -> Result<usize> {
        let count = self.read_uint()?;
        if count > self.remaining() as u64 {
            return Err(GobError::CountTooLarge(count));
        }
        Ok(count as usize)
    }

    fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_count()?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_bytes()?.to_vec())?)
    }
}
