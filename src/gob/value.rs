use super::{GobError, Result};

/// A decoded gob value. Pointers are flattened by the format, so there is no
/// separate nil variant: an absent struct field is simply not in the struct.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Struct(StructValue),
}

impl Value {
    /// Zero values are omitted from struct encodings. Structs are always sent.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Complex(re, im) => *re == 0.0 && *im == 0.0,
            Value::Bytes(b) => b.is_empty(),
            Value::String(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
            Value::Struct(_) => false,
        }
    }
}

/// The fields of a struct value that were present on the wire, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructValue {
    fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.fields.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn take(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.swap_remove(idx).1)
    }

    pub fn take_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(Value::Bytes(b)) => Ok(b),
            Some(_) => Err(mismatch(name, "bytes")),
        }
    }

    pub fn take_string(&mut self, name: &str) -> Result<String> {
        match self.take(name) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(mismatch(name, "string")),
        }
    }

    pub fn take_int(&mut self, name: &str) -> Result<i64> {
        match self.take(name) {
            None => Ok(0),
            Some(Value::Int(i)) => Ok(i),
            Some(_) => Err(mismatch(name, "int")),
        }
    }

    pub fn take_uint(&mut self, name: &str) -> Result<u64> {
        match self.take(name) {
            None => Ok(0),
            Some(Value::Uint(u)) => Ok(u),
            Some(_) => Err(mismatch(name, "uint")),
        }
    }

    pub fn take_bool(&mut self, name: &str) -> Result<bool> {
        match self.take(name) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(_) => Err(mismatch(name, "bool")),
        }
    }

    pub fn take_struct(&mut self, name: &str) -> Result<Option<StructValue>> {
        match self.take(name) {
            None => Ok(None),
            Some(Value::Struct(s)) => Ok(Some(s)),
            Some(_) => Err(mismatch(name, "struct")),
        }
    }

    pub fn take_list(&mut self, name: &str) -> Result<Vec<Value>> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items),
            Some(_) => Err(mismatch(name, "slice")),
        }
    }

    pub fn take_map(&mut self, name: &str) -> Result<Vec<(Value, Value)>> {
        match self.take(name) {
            None => Ok(Vec::new()),
            Some(Value::Map(entries)) => Ok(entries),
            Some(_) => Err(mismatch(name, "map")),
        }
    }
}

fn mismatch(field: &str, expected: &'static str) -> GobError {
    GobError::Mismatch {
        field: field.to_string(),
        expected,
    }
}

/// Static description of a Go type, used by the encoder to emit type
/// definitions and to lay out values.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Bool,
    Int,
    Uint,
    Bytes,
    String,
    Struct(StructSchema),
    Slice {
        name: &'static str,
        elem: Box<Schema>,
    },
    Map {
        name: &'static str,
        key: Box<Schema>,
        elem: Box<Schema>,
    },
}

impl Schema {
    pub fn slice_of(name: &'static str, elem: Schema) -> Self {
        Schema::Slice {
            name,
            elem: Box::new(elem),
        }
    }

    pub fn map_of(name: &'static str, key: Schema, elem: Schema) -> Self {
        Schema::Map {
            name,
            key: Box::new(key),
            elem: Box::new(elem),
        }
    }

    /// Name of a type that needs its own definition on the stream; builtin
    /// types have none.
    pub(crate) fn defined_name(&self) -> Option<&'static str> {
        match self {
            Schema::Struct(s) => Some(s.name),
            Schema::Slice { name, .. } | Schema::Map { name, .. } => Some(*name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    pub name: &'static str,
    pub fields: Vec<(&'static str, Schema)>,
}

impl StructSchema {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &'static str, schema: Schema) -> Self {
        self.fields.push((name, schema));
        self
    }
}

/// A Rust struct that travels as a top-level gob struct value.
pub trait Gob: Sized {
    fn schema() -> StructSchema;

    fn to_value(&self) -> StructValue;

    fn from_value(value: StructValue) -> Result<Self>;
}
