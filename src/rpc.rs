//! Client side of Go's `net/rpc` protocol with the default gob codec.
//!
//! Each call writes a `Request` header followed by the argument value on a
//! single gob stream, and reads back a `Response` header followed by the
//! reply value.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use crate::gob::{self, Decoder, Encoder, Gob, GobError, Schema, StructSchema, StructValue, Value};

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("RPC transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC encoding error: {0}")]
    Gob(#[from] GobError),

    #[error("RPC connection closed before the reply arrived")]
    ConnectionClosed,

    #[error("RPC reply out of sequence: sent {sent}, got {got}")]
    SequenceMismatch { sent: u64, got: u64 },

    #[error("RPC server error: {0}")]
    Server(String),

    #[error("RPC reply was not a struct value")]
    UnexpectedValue,
}

pub type Result<T> = std::result::Result<T, RpcError>;

/// `net/rpc.Request`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestHeader {
    pub service_method: String,
    pub seq: u64,
}

impl Gob for RequestHeader {
    fn schema() -> StructSchema {
        StructSchema::new("Request")
            .field("ServiceMethod", Schema::String)
            .field("Seq", Schema::Uint)
    }

    fn to_value(&self) -> StructValue {
        StructValue::new()
            .with("ServiceMethod", Value::String(self.service_method.clone()))
            .with("Seq", Value::Uint(self.seq))
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        Ok(Self {
            service_method: value.take_string("ServiceMethod")?,
            seq: value.take_uint("Seq")?,
        })
    }
}

/// `net/rpc.Response`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseHeader {
    pub service_method: String,
    pub seq: u64,
    pub error: String,
}

impl Gob for ResponseHeader {
    fn schema() -> StructSchema {
        StructSchema::new("Response")
            .field("ServiceMethod", Schema::String)
            .field("Seq", Schema::Uint)
            .field("Error", Schema::String)
    }

    fn to_value(&self) -> StructValue {
        StructValue::new()
            .with("ServiceMethod", Value::String(self.service_method.clone()))
            .with("Seq", Value::Uint(self.seq))
            .with("Error", Value::String(self.error.clone()))
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        Ok(Self {
            service_method: value.take_string("ServiceMethod")?,
            seq: value.take_uint("Seq")?,
            error: value.take_string("Error")?,
        })
    }
}

/// Reads one length-prefixed gob message. `Ok(None)` means the peer closed
/// the stream cleanly between messages.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 9];
    if reader.read(&mut prefix[..1]).await? == 0 {
        return Ok(None);
    }
    let width = gob::uint_len(prefix[0])?;
    reader.read_exact(&mut prefix[1..width]).await?;
    let (len, _) = gob::decode_uint(&prefix[..width])?;
    if len > gob::MAX_MESSAGE_LEN {
        return Err(GobError::MessageTooLarge(len).into());
    }

    let mut msg = vec![0u8; len as usize];
    reader.read_exact(&mut msg).await?;
    tracing::trace!(len, "read gob frame");
    Ok(Some(msg))
}

/// A gob stream over one connection: the encoder and decoder carry the type
/// definitions already exchanged, so they live as long as the stream.
pub struct GobStream<S> {
    stream: BufStream<S>,
    encoder: Encoder,
    decoder: Decoder,
    pending: Vec<u8>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> GobStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            pending: Vec::new(),
        }
    }

    /// Encodes `value` for the next [`flush`](Self::flush).
    pub fn queue<T: Gob>(&mut self, value: &T) -> Result<()> {
        let bytes = self.encoder.encode(value)?;
        self.pending.extend(bytes);
        Ok(())
    }

    /// Writes everything queued so far in one go.
    pub async fn flush(&mut self) -> Result<()> {
        let buf = std::mem::take(&mut self.pending);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reads messages until the next value arrives, recording any type
    /// definitions on the way.
    pub async fn recv<T: Gob>(&mut self) -> Result<T> {
        loop {
            let frame = read_frame(&mut self.stream)
                .await?
                .ok_or(RpcError::ConnectionClosed)?;
            match self.decoder.decode_message(&frame)? {
                None => continue,
                Some(Value::Struct(value)) => return Ok(T::from_value(value)?),
                Some(_) => return Err(RpcError::UnexpectedValue),
            }
        }
    }
}

pub struct RpcClient<S> {
    stream: GobStream<S>,
    seq: u64,
}

impl RpcClient<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RpcError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        tracing::debug!(addr, "connected");
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> RpcClient<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: GobStream::new(stream),
            seq: 0,
        }
    }

    /// Calls `method` and waits for its reply. There is no timeout: a peer
    /// that never answers blocks the call forever.
    pub async fn call<A: Gob, R: Gob>(&mut self, method: &str, args: &A) -> Result<R> {
        let seq = self.seq;
        self.seq += 1;

        let header = RequestHeader {
            service_method: method.to_string(),
            seq,
        };
        tracing::debug!(method, seq, "sending rpc request");
        self.stream.queue(&header)?;
        self.stream.queue(args)?;
        self.stream.flush().await?;

        let reply: ResponseHeader = self.stream.recv().await?;
        if reply.seq != seq {
            return Err(RpcError::SequenceMismatch {
                sent: seq,
                got: reply.seq,
            });
        }
        if !reply.error.is_empty() {
            return Err(RpcError::Server(reply.error));
        }
        self.stream.recv().await
    }
}

/// A minimal Go Lambda function stand-in: accepts one connection, serves
/// `Function.Invoke` calls with `handler` until the client disconnects.
#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;

    use tokio::net::TcpListener;

    use super::*;
    use crate::messages::{InvokeRequest, InvokeResponse, INVOKE_PROCEDURE};

    /// Body Go sends after a failed call (`struct{}{}`).
    pub(crate) struct Empty;

    impl Gob for Empty {
        fn schema() -> StructSchema {
            StructSchema::new("")
        }

        fn to_value(&self) -> StructValue {
            StructValue::new()
        }

        fn from_value(_: StructValue) -> gob::Result<Self> {
            Ok(Empty)
        }
    }

    pub(crate) async fn serve<S, F>(stream: S, handler: F) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: Fn(InvokeRequest) -> std::result::Result<InvokeResponse, String>,
    {
        let mut stream = GobStream::new(stream);
        loop {
            let header: RequestHeader = match stream.recv().await {
                Ok(h) => h,
                Err(RpcError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            };
            let request: InvokeRequest = stream.recv().await?;
            let outcome = if header.service_method == INVOKE_PROCEDURE {
                handler(request)
            } else {
                Err(format!(
                    "rpc: can't find service {}",
                    header.service_method
                ))
            };
            let mut reply = ResponseHeader {
                service_method: header.service_method,
                seq: header.seq,
                error: String::new(),
            };
            match outcome {
                Ok(body) => {
                    stream.queue(&reply)?;
                    stream.queue(&body)?;
                }
                Err(message) => {
                    reply.error = message;
                    stream.queue(&reply)?;
                    stream.queue(&Empty)?;
                }
            }
            stream.flush().await?;
        }
    }

    pub(crate) async fn spawn_function<F>(handler: F) -> SocketAddr
    where
        F: Fn(InvokeRequest) -> std::result::Result<InvokeResponse, String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            serve(socket, handler).await.unwrap();
        });
        addr
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::testing::serve;
    use super::*;
    use crate::messages::{InvokeRequest, InvokeResponse, INVOKE_PROCEDURE};

    #[tokio::test]
    async fn call_returns_the_function_reply() {
        let (client_side, server_side) = duplex(4096);
        tokio::spawn(serve(server_side, |req: InvokeRequest| {
            Ok(InvokeResponse {
                payload: req.payload.iter().rev().copied().collect(),
                ..InvokeResponse::default()
            })
        }));

        let mut client = RpcClient::new(client_side);
        let req = InvokeRequest {
            payload: b"abc".to_vec(),
            ..InvokeRequest::default()
        };
        let resp: InvokeResponse = client.call(INVOKE_PROCEDURE, &req).await.unwrap();
        assert_eq!(resp.payload, b"cba");

        // second call reuses the type definitions already on the stream
        let resp: InvokeResponse = client.call(INVOKE_PROCEDURE, &req).await.unwrap();
        assert_eq!(resp.payload, b"cba");
    }

    #[tokio::test]
    async fn server_errors_are_surfaced_verbatim() {
        let (client_side, server_side) = duplex(4096);
        tokio::spawn(serve(server_side, |_| Ok(InvokeResponse::default())));

        let mut client = RpcClient::new(client_side);
        let err = client
            .call::<_, InvokeResponse>("Function.Missing", &InvokeRequest::default())
            .await
            .unwrap_err();
        match err {
            RpcError::Server(message) => {
                assert_eq!(message, "rpc: can't find service Function.Missing")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_connection_is_reported() {
        let (client_side, server_side) = duplex(4096);
        drop(server_side);

        let mut client = RpcClient::new(client_side);
        let err = client
            .call::<_, InvokeResponse>(INVOKE_PROCEDURE, &InvokeRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Io(_) | RpcError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn refused_connection_names_the_address() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = match RpcClient::connect(&addr).await {
            Err(e) => e,
            Ok(_) => panic!("connected to a closed port"),
        };
        match err {
            RpcError::Connect { addr: a, source } => {
                assert_eq!(a, addr);
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionRefused);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn frames_split_on_length_prefix() {
        let mut data: &[u8] = &[0x02, 0xaa, 0xbb, 0x01, 0xcc];
        assert_eq!(read_frame(&mut data).await.unwrap(), Some(vec![0xaa, 0xbb]));
        assert_eq!(read_frame(&mut data).await.unwrap(), Some(vec![0xcc]));
        assert_eq!(read_frame(&mut data).await.unwrap(), None);
    }
}
