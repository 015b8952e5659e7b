// Tracing log adapter - LogPort backed by the tracing macros
//
// The subscriber itself is installed once by `utils::logging`; this adapter
// only applies the configured level before forwarding.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::ports::{LogLevel, LogPort};

/// Tracing log adapter
#[derive(Debug, Clone)]
pub struct TracingLogAdapter {
    current_level: LogLevel,
}

impl TracingLogAdapter {
    pub fn new(level: LogLevel) -> Self {
        Self {
            current_level: level,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.current_level
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.current_level
    }
}

impl Default for TracingLogAdapter {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

#[async_trait]
impl LogPort for TracingLogAdapter {
    async fn info(&self, message: &str) {
        if self.should_log(LogLevel::Info) {
            info!("{}", message);
        }
    }

    async fn warn(&self, message: &str) {
        if self.should_log(LogLevel::Warn) {
            warn!("{}", message);
        }
    }

    async fn error(&self, message: &str) {
        if self.should_log(LogLevel::Error) {
            error!("{}", message);
        }
    }

    async fn debug(&self, message: &str) {
        if self.should_log(LogLevel::Debug) {
            debug!("{}", message);
        }
    }
}
