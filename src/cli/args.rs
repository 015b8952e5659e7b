//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;
use clap_num::number_range;

use crate::domain::model::RgbColor;

fn parse_crf(s: &str) -> Result<u8, String> {
    number_range(s, 0, 51)
}

fn parse_opacity(s: &str) -> Result<u8, String> {
    number_range(s, 0, 255)
}

fn parse_color(s: &str) -> Result<RgbColor, String> {
    RgbColor::parse(s).map_err(|e| e.to_string())
}

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input clip, in merge order (repeatable)
    #[arg(short, long = "clip", value_name = "PATH")]
    pub clips: Vec<PathBuf>,

    /// Merge every .mp4/.mov/.m4v file in this directory, sorted by name
    #[arg(short, long, conflicts_with = "clips")]
    pub dir: Option<PathBuf>,

    /// Output MP4 path; an existing file is replaced
    #[arg(short, long)]
    pub output: PathBuf,

    /// Watermark text
    #[arg(long)]
    pub watermark_text: Option<String>,

    /// Do not burn a watermark into the video
    #[arg(long, conflicts_with = "watermark_text")]
    pub no_watermark: bool,

    /// Watermark color (#RRGGBB, white, black)
    #[arg(long, value_parser = parse_color)]
    pub color: Option<RgbColor>,

    /// Watermark opacity (0-255)
    #[arg(long, value_parser = parse_opacity)]
    pub opacity: Option<u8>,

    /// Horizontal anchor, -1.0 (left) to 1.0 (right)
    #[arg(long, allow_negative_numbers = true)]
    pub anchor_x: Option<f64>,

    /// Vertical anchor, -1.0 (bottom) to 1.0 (top)
    #[arg(long, allow_negative_numbers = true)]
    pub anchor_y: Option<f64>,

    /// Watermark width as a fraction of the frame
    #[arg(long)]
    pub scale_x: Option<f64>,

    /// Watermark height as a fraction of the frame
    #[arg(long)]
    pub scale_y: Option<f64>,

    /// Rotation hint written on the video track (0, 90, 180, 270)
    #[arg(long)]
    pub orientation: Option<u32>,

    /// Constant Rate Factor for the watermark re-encode (0-51)
    #[arg(long, value_parser = parse_crf)]
    pub crf: Option<u8>,

    /// Leave the moov atom at the end of the file
    #[arg(long)]
    pub no_faststart: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Clips to inspect, in merge order
    #[arg(required = true, value_name = "PATH")]
    pub clips: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Merged file to check
    #[arg(value_name = "PATH")]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the channel command
#[derive(Args, Debug)]
pub struct ChannelArgs {
    /// Method call as JSON, e.g. {"method":"mergeVideos","arguments":{...}}; read from stdin when absent
    #[arg(short, long)]
    pub request: Option<String>,
}

/// Arguments for the convert-image command
#[derive(Args, Debug)]
pub struct ConvertImageArgs {
    /// Still image
    #[arg(short, long)]
    pub image: PathBuf,

    /// Output video path
    #[arg(short, long)]
    pub output: PathBuf,
}
