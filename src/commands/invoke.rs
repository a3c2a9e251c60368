use chrono::TimeDelta;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::decode::decode_response;
use crate::error::{InvokeError, Result};
use crate::messages::{InvokeRequest, InvokeResponse, INVOKE_PROCEDURE};
use crate::output::{self, Emitted};
use crate::rpc::RpcClient;

#[derive(Debug, Clone)]
pub struct InvokeArgs {
    pub event: Option<String>,
    pub output: Option<PathBuf>,
    pub addr: String,
    pub timeout: TimeDelta,
    pub function_arn: Option<String>,
}

/// Sends the event file to the function, then decodes and emits its reply.
pub async fn run(args: &InvokeArgs) -> Result<Emitted> {
    let event = args
        .event
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            InvokeError::config("You must specify an event [request] to send to the function (-e)")
        })?;

    let payload = std::fs::read(event).map_err(|source| InvokeError::EventFile {
        path: event.to_string(),
        source,
    })?;
    tracing::debug!(path = event, bytes = payload.len(), "read event file");

    let mut client = RpcClient::connect(&args.addr).await?;

    let mut request = InvokeRequest::new(payload, args.timeout);
    if let Some(arn) = &args.function_arn {
        request = request.with_function_arn(arn.clone());
    }
    tracing::debug!(request_id = %request.request_id, addr = %args.addr, "invoking function");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} Invoking {msg}...")
    {
        spinner.set_style(style);
    }
    spinner.set_message(args.addr.clone());
    spinner.enable_steady_tick(Duration::from_millis(80));

    let response = client
        .call::<_, InvokeResponse>(INVOKE_PROCEDURE, &request)
        .await;
    spinner.finish_and_clear();
    let response = response?;

    if let Some(error) = response.error {
        return Err(InvokeError::Function {
            kind: error.kind,
            message: error.message,
        });
    }

    let decoded = decode_response(&response.payload)?;
    Ok(output::emit_response(&decoded, args.output.as_deref()))
}
