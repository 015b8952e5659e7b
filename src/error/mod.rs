//! Error handling module for reelmerge
//!
//! `MediaError` covers faults raised by a media toolkit (FFmpeg or the
//! in-memory one used in tests). The merge pipeline never lets these escape:
//! they are folded into `MergeError` at the point where the failing clip or
//! stage is known.

use thiserror::Error;

/// Toolkit-level error type
#[derive(Error, Debug)]
pub enum MediaError {
    /// Input could not be opened
    #[error("Failed to open media: {message}")]
    OpenFailed { message: String },

    /// Container could not be demuxed
    #[error("Failed to demux media: {message}")]
    DemuxFailed { message: String },

    /// Output container rejected a track or sample
    #[error("Failed to mux output: {message}")]
    MuxFailed { message: String },

    /// Decoder or encoder fault
    #[error("Codec error: {message}")]
    CodecFailed { message: String },

    /// Overlay filter graph fault
    #[error("Filter graph error: {message}")]
    FilterFailed { message: String },

    /// Handle used out of order (e.g. sample before track selection)
    #[error("Invalid media state: {message}")]
    InvalidState { message: String },

    /// Blocking worker could not complete
    #[error("Media worker failed: {message}")]
    WorkerFailed { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON container error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    FFmpegError(#[from] ffmpeg_next::Error),
}

/// Result type alias for toolkit operations
pub type MediaResult<T> = std::result::Result<T, MediaError>;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
