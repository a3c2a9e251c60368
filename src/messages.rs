//! Invoke payloads exchanged with a Go Lambda function over `net/rpc`.
//!
//! Field names must match the function's `messages` package exactly: gob
//! pairs struct fields by name, and unknown fields are skipped by the peer.

use chrono::{DateTime, TimeDelta, Utc};

use crate::gob::{self, Gob, Schema, StructSchema, StructValue, Value};

/// Procedure served by every Go Lambda function.
pub const INVOKE_PROCEDURE: &str = "Function.Invoke";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeRequestTimestamp {
    pub seconds: i64,
    pub nanos: i64,
}

impl InvokeRequestTimestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            seconds: at.timestamp(),
            nanos: at.timestamp_subsec_nanos() as i64,
        }
    }
}

impl Gob for InvokeRequestTimestamp {
    fn schema() -> StructSchema {
        StructSchema::new("InvokeRequest_Timestamp")
            .field("Seconds", Schema::Int)
            .field("Nanos", Schema::Int)
    }

    fn to_value(&self) -> StructValue {
        StructValue::new()
            .with("Seconds", Value::Int(self.seconds))
            .with("Nanos", Value::Int(self.nanos))
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        Ok(Self {
            seconds: value.take_int("Seconds")?,
            nanos: value.take_int("Nanos")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeRequest {
    pub payload: Vec<u8>,
    pub request_id: String,
    pub x_amzn_trace_id: String,
    pub deadline: InvokeRequestTimestamp,
    pub invoked_function_arn: String,
    pub cognito_identity_id: String,
    pub cognito_identity_pool_id: String,
    pub client_context: Vec<u8>,
}

impl InvokeRequest {
    /// A request carrying `payload` verbatim, with a fresh request id and a
    /// deadline `timeout` from now, clamped to the latest representable time.
    pub fn new(payload: Vec<u8>, timeout: TimeDelta) -> Self {
        let now = Utc::now();
        Self {
            payload,
            request_id: request_id(now),
            deadline: InvokeRequestTimestamp::from_datetime(
                now.checked_add_signed(timeout)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            ..Self::default()
        }
    }

    pub fn with_function_arn(mut self, arn: impl Into<String>) -> Self {
        self.invoked_function_arn = arn.into();
        self
    }
}

fn request_id(now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_default();
    format!("{:016x}-{:08x}", nanos, std::process::id())
}

impl Gob for InvokeRequest {
    fn schema() -> StructSchema {
        StructSchema::new("InvokeRequest")
            .field("Payload", Schema::Bytes)
            .field("RequestId", Schema::String)
            .field("XAmznTraceId", Schema::String)
            .field("Deadline", Schema::Struct(InvokeRequestTimestamp::schema()))
            .field("InvokedFunctionArn", Schema::String)
            .field("CognitoIdentityId", Schema::String)
            .field("CognitoIdentityPoolId", Schema::String)
            .field("ClientContext", Schema::Bytes)
    }

    fn to_value(&self) -> StructValue {
        StructValue::new()
            .with("Payload", Value::Bytes(self.payload.clone()))
            .with("RequestId", Value::String(self.request_id.clone()))
            .with("XAmznTraceId", Value::String(self.x_amzn_trace_id.clone()))
            .with("Deadline", Value::Struct(self.deadline.to_value()))
            .with(
                "InvokedFunctionArn",
                Value::String(self.invoked_function_arn.clone()),
            )
            .with(
                "CognitoIdentityId",
                Value::String(self.cognito_identity_id.clone()),
            )
            .with(
                "CognitoIdentityPoolId",
                Value::String(self.cognito_identity_pool_id.clone()),
            )
            .with("ClientContext", Value::Bytes(self.client_context.clone()))
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        let deadline = match value.take_struct("Deadline")? {
            Some(d) => InvokeRequestTimestamp::from_value(d)?,
            None => InvokeRequestTimestamp::default(),
        };
        Ok(Self {
            payload: value.take_bytes("Payload")?,
            request_id: value.take_string("RequestId")?,
            x_amzn_trace_id: value.take_string("XAmznTraceId")?,
            deadline,
            invoked_function_arn: value.take_string("InvokedFunctionArn")?,
            cognito_identity_id: value.take_string("CognitoIdentityId")?,
            cognito_identity_pool_id: value.take_string("CognitoIdentityPoolId")?,
            client_context: value.take_bytes("ClientContext")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeResponseErrorStackFrame {
    pub path: String,
    pub line: i64,
    pub label: String,
}

impl Gob for InvokeResponseErrorStackFrame {
    fn schema() -> StructSchema {
        StructSchema::new("InvokeResponse_Error_StackFrame")
            .field("Path", Schema::String)
            .field("Line", Schema::Int)
            .field("Label", Schema::String)
    }

    fn to_value(&self) -> StructValue {
        StructValue::new()
            .with("Path", Value::String(self.path.clone()))
            .with("Line", Value::Int(self.line))
            .with("Label", Value::String(self.label.clone()))
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        Ok(Self {
            path: value.take_string("Path")?,
            line: value.take_int("Line")?,
            label: value.take_string("Label")?,
        })
    }
}

/// Error reported by the function's handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeResponseError {
    pub message: String,
    pub kind: String,
    pub stack_trace: Vec<InvokeResponseErrorStackFrame>,
    pub should_exit: bool,
}

impl Gob for InvokeResponseError {
    fn schema() -> StructSchema {
        StructSchema::new("InvokeResponse_Error")
            .field("Message", Schema::String)
            .field("Type", Schema::String)
            .field(
                "StackTrace",
                Schema::slice_of(
                    "[]*messages.InvokeResponse_Error_StackFrame",
                    Schema::Struct(InvokeResponseErrorStackFrame::schema()),
                ),
            )
            .field("ShouldExit", Schema::Bool)
    }

    fn to_value(&self) -> StructValue {
        StructValue::new()
            .with("Message", Value::String(self.message.clone()))
            .with("Type", Value::String(self.kind.clone()))
            .with(
                "StackTrace",
                Value::List(
                    self.stack_trace
                        .iter()
                        .map(|f| Value::Struct(f.to_value()))
                        .collect(),
                ),
            )
            .with("ShouldExit", Value::Bool(self.should_exit))
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        let stack_trace = value
            .take_list("StackTrace")?
            .into_iter()
            .map(|frame| match frame {
                Value::Struct(s) => InvokeResponseErrorStackFrame::from_value(s),
                _ => Err(gob::GobError::Mismatch {
                    field: "StackTrace".into(),
                    expected: "struct",
                }),
            })
            .collect::<gob::Result<Vec<_>>>()?;
        Ok(Self {
            message: value.take_string("Message")?,
            kind: value.take_string("Type")?,
            stack_trace,
            should_exit: value.take_bool("ShouldExit")?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeResponse {
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub error: Option<InvokeResponseError>,
}

impl Gob for InvokeResponse {
    fn schema() -> StructSchema {
        StructSchema::new("InvokeResponse")
            .field("Payload", Schema::Bytes)
            .field(
                "Headers",
                Schema::map_of("map[string]string", Schema::String, Schema::String),
            )
            .field("Error", Schema::Struct(InvokeResponseError::schema()))
    }

    fn to_value(&self) -> StructValue {
        let mut value = StructValue::new()
            .with("Payload", Value::Bytes(self.payload.clone()))
            .with(
                "Headers",
                Value::Map(
                    self.headers
                        .iter()
                        .map(|(k, v)| (Value::String(k.clone()), Value::String(v.clone())))
                        .collect(),
                ),
            );
        if let Some(error) = &self.error {
            value.insert("Error", Value::Struct(error.to_value()));
        }
        value
    }

    fn from_value(mut value: StructValue) -> gob::Result<Self> {
        let headers = value
            .take_map("Headers")?
            .into_iter()
            .filter_map(|entry| match entry {
                (Value::String(k), Value::String(v)) => Some((k, v)),
                _ => None,
            })
            .collect();
        let error = value
            .take_struct("Error")?
            .map(InvokeResponseError::from_value)
            .transpose()?;
        Ok(Self {
            payload: value.take_bytes("Payload")?,
            headers,
            error,
        })
    }
}
