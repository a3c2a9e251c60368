mod commands;
mod config;
mod decode;
mod error;
mod gob;
mod messages;
mod output;
mod rpc;

use chrono::{TimeDelta, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::invoke::InvokeArgs;
use error::InvokeError;

#[derive(Parser)]
#[command(
    name = "lambda-invoke",
    version,
    about = "Send a test event to a Go Lambda function running locally"
)]
struct Cli {
    /// The event [request] to send to the function (a .json file)
    #[arg(short = 'e', long = "event")]
    event: Option<String>,

    /// Write the decoded [response] from the function to this file
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Host the function listens on
    #[arg(long, env = "LAMBDA_INVOKE_HOST")]
    host: Option<String>,

    /// Port the function listens on
    #[arg(long, env = "LAMBDA_SERVER_PORT")]
    port: Option<u16>,

    /// Seconds before the invocation deadline passed to the function
    #[arg(long, env = "LAMBDA_INVOKE_TIMEOUT")]
    timeout: Option<u64>,

    /// ARN reported to the function as the invoked function
    #[arg(long, env = "LAMBDA_FUNCTION_ARN")]
    function_arn: Option<String>,
}

impl Cli {
    fn into_args(self, cfg: config::InvokeConfig) -> error::Result<InvokeArgs> {
        let host = self
            .host
            .or(cfg.host)
            .unwrap_or_else(|| config::DEFAULT_HOST.into());
        let port = self.port.or(cfg.port).unwrap_or(config::DEFAULT_PORT);
        let timeout_secs = self
            .timeout
            .or(cfg.timeout_secs)
            .unwrap_or(config::DEFAULT_TIMEOUT_SECS);
        let timeout = i64::try_from(timeout_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .filter(|t| Utc::now().checked_add_signed(*t).is_some())
            .ok_or_else(|| InvokeError::config(format!("timeout out of range: {timeout_secs}")))?;

        Ok(InvokeArgs {
            event: self.event,
            output: self.output,
            addr: format!("{host}:{port}"),
            timeout,
            function_arn: self.function_arn.or(cfg.function_arn),
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .parse_lossy(std::env::var("RUST_LOG").as_deref().unwrap_or("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    let cfg = config::InvokeConfig::load();

    let result = match cli.into_args(cfg) {
        Ok(args) => commands::invoke::run(&args).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_take_precedence_over_config() {
        let cli = Cli::parse_from([
            "lambda-invoke",
            "-e",
            "event.json",
            "-o",
            "out.txt",
            "--port",
            "9001",
        ]);
        let cfg = config::InvokeConfig {
            host: Some("127.0.0.1".into()),
            port: Some(8001),
            timeout_secs: Some(10),
            function_arn: None,
        };
        let args = cli.into_args(cfg).unwrap();
        assert_eq!(args.event.as_deref(), Some("event.json"));
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert_eq!(args.addr, "127.0.0.1:9001");
        assert_eq!(args.timeout, TimeDelta::seconds(10));
    }

    #[test]
    fn defaults_target_the_local_function_port() {
        let cli = Cli::parse_from(["lambda-invoke", "-e", "event.json"]);
        let args = cli.into_args(config::InvokeConfig::default()).unwrap();
        assert_eq!(args.addr, "localhost:9988");
        assert_eq!(args.timeout, TimeDelta::seconds(300));
        assert!(args.output.is_none());
    }

    #[test]
    fn event_flag_is_optional_at_parse_time() {
        let cli = Cli::parse_from(["lambda-invoke"]);
        let args = cli.into_args(config::InvokeConfig::default()).unwrap();
        assert!(args.event.is_none());
    }

    #[test]
    fn timeout_past_the_calendar_range_is_rejected() {
        // representable as a TimeDelta, but now + timeout overflows the date range
        let cli = Cli::parse_from(["lambda-invoke", "-e", "x", "--timeout", "10000000000000"]);
        assert!(matches!(
            cli.into_args(config::InvokeConfig::default()),
            Err(InvokeError::Config(_))
        ));
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let cli = Cli::parse_from(["lambda-invoke", "-e", "x", "--timeout", "18446744073709551615"]);
        assert!(matches!(
            cli.into_args(config::InvokeConfig::default()),
            Err(InvokeError::Config(_))
        ));
    }
}
