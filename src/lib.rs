//! reelmerge library
//!
//! Merges short video clips into a single MP4 whose timestamps run
//! continuously across clip boundaries. Compressed samples are copied as-is;
//! only an optional text watermark forces the video track through a
//! decode, draw, encode stage.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod planner;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::MergeError;
pub use domain::model::{MergeRequest, MergeSettings, MergeSummary, OverlayDescriptor};
pub use engine::MergeEngine;
pub use error::{ConfigError, MediaError, MediaResult};
pub use tokio_util::sync::CancellationToken;
