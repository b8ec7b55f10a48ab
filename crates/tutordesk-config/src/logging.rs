//! Logging settings.
//!
//! # Environment Variables
//!
//! - `LOG_LEVEL`: default level for tutordesk crates when `RUST_LOG` is unset (default: "info")
//! - `LOG_FORMAT`: `compact` or `json` (default: "compact")
//! - `LOG_DIR`: when set, logs are also written to a daily rolling file in this directory

use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub directory: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: crate::env_or("LOG_FORMAT", LogFormat::Compact),
            directory: std::env::var("LOG_DIR").ok().map(PathBuf::from),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            directory: None,
        }
    }
}
