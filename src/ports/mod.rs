// Ports - Interface definitions (contracts)
//
// The merge pipeline is written entirely against `MediaToolkit` and its
// handle traits. Handles release their underlying resources on drop, so a
// clip opened by the sequencer is closed exactly once on every exit path.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::domain::model::*;
use crate::error::{ConfigError, MediaResult};

/// Media toolkit capability (demux, mux, overlay)
pub trait MediaToolkit: Send + Sync {
    /// Toolkit-specific track format descriptor
    type Format: Clone + fmt::Debug;
    type Clip: ClipSource<Format = Self::Format>;
    type Output: OutputSink<Format = Self::Format>;
    type Overlay: OverlayStage<Format = Self::Format>;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Open an input clip for reading
    fn open_clip(&self, path: &Path) -> MediaResult<Self::Clip>;

    /// Create an output container at `path`, truncating anything there
    fn create_output(&self, path: &Path, options: &OutputOptions) -> MediaResult<Self::Output>;

    /// Build the overlay stage for a merge whose video template is `video`
    fn create_overlay(
        &self,
        descriptor: &OverlayDescriptor,
        video: &TrackInfo<Self::Format>,
    ) -> MediaResult<Self::Overlay>;
}

/// Open read handle to one input clip
pub trait ClipSource {
    type Format;

    /// Tracks in source order
    fn list_tracks(&self) -> Vec<TrackInfo<Self::Format>>;

    /// Restrict `read_next_sample` to the track with source index `index`
    fn select_track(&mut self, index: usize) -> MediaResult<()>;

    /// Seek the selected track to the nearest sync point at or before `timestamp_us`
    fn seek_to_sync(&mut self, timestamp_us: i64) -> MediaResult<()>;

    /// Next sample of the selected track, `None` at end of stream
    fn read_next_sample(&mut self) -> MediaResult<Option<Sample>>;
}

/// Output container under construction. Dropping it without `finalize`
/// releases the handle and leaves whatever was written unfinished.
pub trait OutputSink {
    type Format;

    /// Declare an output track, returning its output index
    fn declare_track(&mut self, track: &TrackInfo<Self::Format>) -> MediaResult<usize>;

    /// Write the container header; no tracks may be declared afterwards
    fn start(&mut self) -> MediaResult<()>;

    fn write_sample(&mut self, track: usize, sample: &Sample) -> MediaResult<()>;

    /// Flush and close the container
    fn finalize(self) -> MediaResult<()>;
}

/// Composes a static layer onto video samples
pub trait OverlayStage {
    type Format;

    /// Format of the video track the stage produces
    fn output_format(&self) -> TrackInfo<Self::Format>;

    fn begin_clip(&mut self, source: &TrackInfo<Self::Format>) -> MediaResult<()>;

    /// Feed one source sample; returns whatever composed samples are ready.
    /// Timestamps stay clip-relative.
    fn compose(&mut self, sample: Sample) -> MediaResult<Vec<Sample>>;

    /// Drain samples still buffered for the current clip
    fn finish_clip(&mut self) -> MediaResult<Vec<Sample>>;
}

/// Port for configuration management
#[async_trait]
pub trait ConfigPort: Send + Sync {
    /// Load configuration from file
    async fn load_config(&self, file_path: &str) -> Result<(), ConfigError>;

    /// Current settings
    async fn settings(&self) -> MergeSettings;

    /// Replace the current settings
    async fn update_settings(&self, settings: MergeSettings) -> Result<(), ConfigError>;

    /// Get configuration file path
    async fn get_config_file_path(&self) -> String;
}

/// Port for logging and observability
#[async_trait]
pub trait LogPort: Send + Sync {
    /// Log info message
    async fn info(&self, message: &str);

    /// Log warning message
    async fn warn(&self, message: &str);

    /// Log error message
    async fn error(&self, message: &str);

    /// Log debug message
    async fn debug(&self, message: &str);
}

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse log level from string
    pub fn parse(level_str: &str) -> Result<Self, ConfigError> {
        match level_str.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Invalid {
                message: format!(
                    "Invalid log level: {}. Valid levels: trace, debug, info, warn, error",
                    level_str
                ),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
