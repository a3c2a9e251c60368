use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Port Go Lambda functions listen on (`_LAMBDA_SERVER_PORT`).
pub const DEFAULT_PORT: u16 = 9988;
pub const DEFAULT_HOST: &str = "localhost";
/// Seconds the function is given before its invocation deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct InvokeConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub function_arn: Option<String>,
}

impl InvokeConfig {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// A missing or unreadable file yields the defaults.
    pub fn load_from(path: &std::path::Path) -> Self {
        if path.exists() {
            let content = std::fs::read_to_string(path).unwrap_or_default();
            toml::from_str(&content).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lambda-invoke")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_endpoint_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "host = \"127.0.0.1\"\nport = 8001\ntimeout_secs = 5\n").unwrap();

        let cfg = InvokeConfig::load_from(&path);
        assert_eq!(cfg.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(cfg.port, Some(8001));
        assert_eq!(cfg.timeout_secs, Some(5));
        assert_eq!(cfg.function_arn, None);
    }

    #[test]
    fn missing_or_broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert_eq!(InvokeConfig::load_from(&missing), InvokeConfig::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "port = \"not a number\"").unwrap();
        assert_eq!(InvokeConfig::load_from(&broken), InvokeConfig::default());
    }
}
