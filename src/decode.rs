//! Turns the raw payload returned by the function into displayable text.
//!
//! The payload first goes through a JSON string escape and unescape round
//! trip, then the resulting text is base64-decoded. Both stages run in that
//! order and each has its own failure.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("could not marshal the function response payload: {0}")]
    NotText(#[from] std::str::Utf8Error),

    #[error("could not marshal the function response payload: {0}")]
    Escape(#[source] serde_json::Error),

    #[error("could not remove escaped quotes from the function response: {0}")]
    Unquote(#[source] serde_json::Error),

    #[error("could not base64 decode the function response string: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Bytes produced by [`decode_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResponse {
    bytes: Vec<u8>,
}

impl DecodedResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Empty or whitespace-only responses are not worth showing.
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

pub fn decode_response(payload: &[u8]) -> Result<DecodedResponse, DecodeError> {
    let text = unescape_round_trip(payload)?;
    // newlines are skipped like Go's base64 decoder does
    let compact: String = text.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(DecodedResponse { bytes })
}

fn unescape_round_trip(payload: &[u8]) -> Result<String, DecodeError> {
    let raw = std::str::from_utf8(payload)?;
    let quoted = serde_json::to_string(raw).map_err(DecodeError::Escape)?;
    serde_json::from_str::<String>(&quoted).map_err(DecodeError::Unquote)
}
