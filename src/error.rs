use thiserror::Error;

use crate::decode::DecodeError;
use crate::rpc::RpcError;

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read event file {path}: {source}")]
    EventFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("Function returned an error ({kind}): {message}")]
    Function { kind: String, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl InvokeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, InvokeError>;
