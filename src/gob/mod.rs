//! A subset of Go's `encoding/gob` stream format, enough to speak `net/rpc`
//! with a Go Lambda function.
//!
//! A gob stream is a sequence of messages, each prefixed with its byte count.
//! A message starts with a signed type id: negative ids carry a type
//! definition, positive ids carry a value of a previously defined type.
//! Struct values are sent as `(field delta, value)` pairs terminated by a zero
//! delta, with zero-valued fields left out entirely.

mod decode;
mod encode;
mod value;

use thiserror::Error;

pub use decode::Decoder;
pub use encode::Encoder;
pub use value::{Gob, Schema, StructSchema, StructValue, Value};

pub type TypeId = i64;

pub const BOOL_ID: TypeId = 1;
pub const INT_ID: TypeId = 2;
pub const UINT_ID: TypeId = 3;
pub const FLOAT_ID: TypeId = 4;
pub const BYTES_ID: TypeId = 5;
pub const STRING_ID: TypeId = 6;
pub const COMPLEX_ID: TypeId = 7;
pub const INTERFACE_ID: TypeId = 8;

/// Ids below this are reserved for the builtin and bootstrap types.
pub const FIRST_USER_ID: TypeId = 65;

/// Largest message the decoder accepts, matching Go's limit on 64-bit targets.
pub const MAX_MESSAGE_LEN: u64 = 1 << 30;

#[derive(Error, Debug)]
pub enum GobError {
    #[error("unexpected end of gob data")]
    UnexpectedEof,

    #[error("gob integer wider than 8 bytes")]
    IntegerOverflow,

    #[error("gob message of {0} bytes exceeds the size limit")]
    MessageTooLarge(u64),

    #[error("{0} bytes left over after decoding a gob message")]
    TrailingBytes(usize),

    #[error("gob string is not valid UTF-8")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("reference to undefined gob type id {0}")]
    UnknownType(TypeId),

    #[error("gob type id {0} defined twice")]
    DuplicateType(TypeId),

    #[error("malformed gob type definition: {0}")]
    BadTypeDefinition(&'static str),

    #[error("field number {field} out of range for struct {name}")]
    FieldOutOfRange { name: String, field: i64 },

    #[error("non-zero delta for singleton value")]
    BadSingleton,

    #[error("gob element count {0} exceeds remaining data")]
    CountTooLarge(u64),

    #[error("unsupported gob feature: {0}")]
    Unsupported(&'static str),

    #[error("type mismatch for {field}: expected {expected}")]
    Mismatch {
        field: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, GobError>;

/// Number of bytes the unsigned integer starting with `first` occupies,
/// including `first` itself.
pub fn uint_len(first: u8) -> Result<usize> {
    if first < 0x80 {
        return Ok(1);
    }
    let width = first.wrapping_neg() as usize;
    if width > 8 {
        return Err(GobError::IntegerOverflow);
    }
    Ok(1 + width)
}

/// Decodes one unsigned integer from the front of `buf`, returning the value
/// and the number of bytes consumed.
pub fn decode_uint(buf: &[u8]) -> Result<(u64, usize)> {
    let first = *buf.first().ok_or(GobError::UnexpectedEof)?;
    let len = uint_len(first)?;
    if len == 1 {
        return Ok((first as u64, 1));
    }
    let bytes = buf.get(1..len).ok_or(GobError::UnexpectedEof)?;
    let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64);
    Ok((value, len))
}

pub(crate) fn encode_uint(out: &mut Vec<u8>, value: u64) {
    if value < 0x80 {
        out.push(value as u8);
        return;
    }
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let width = bytes.len() - skip;
    out.push((width as u8).wrapping_neg());
    out.extend_from_slice(&bytes[skip..]);
}

pub(crate) fn encode_int(out: &mut Vec<u8>, value: i64) {
    let folded = if value < 0 {
        ((!value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    encode_uint(out, folded);
}

pub(crate) fn unfold_int(folded: u64) -> i64 {
    if folded & 1 == 1 {
        !((folded >> 1) as i64)
    } else {
        (folded >> 1) as i64
    }
}
