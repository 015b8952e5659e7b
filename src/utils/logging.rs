//! Logging setup over tracing-subscriber

use serde::{Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;
use crate::ports::LogLevel;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text with targets
    #[default]
    Full,
    /// Compact single-line text
    Compact,
    /// JSON lines for log collectors
    Json,
}

impl LogFormat {
    pub fn parse(format: &str) -> Result<Self, ConfigError> {
        match format.to_lowercase().as_str() {
            "full" | "pretty" => Ok(LogFormat::Full),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Invalid {
                message: format!(
                    "Invalid log format: {}. Valid formats: full, compact, json",
                    format
                ),
            }),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`; logs go to
/// stderr so stdout stays free for command output.
pub fn init_logging(level: LogLevel, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if installed.is_err() {
        debug!("Global subscriber already installed");
    }
}
