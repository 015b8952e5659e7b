//! Command-line interface module

pub mod args;
pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use args::*;

/// reelmerge - Stitch short clips into one MP4
#[derive(Parser, Debug)]
#[command(name = "reelmerge")]
#[command(about = "Merge short video clips into one MP4 with continuous timestamps and an optional text watermark")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format (full, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Configuration file
    #[arg(long, global = true, env = "REELMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge clips into one MP4
    Merge(MergeArgs),
    /// List the tracks of each clip and the tracks a merge would produce
    Inspect(InspectArgs),
    /// Check a merged file for continuous timestamps
    Verify(VerifyArgs),
    /// Handle one platform-channel method call given as JSON
    Channel(ChannelArgs),
    /// Turn a still image into a video (not implemented)
    ConvertImage(ConvertImageArgs),
}
