// Domain models - Core types and data structures

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::MergeError;

pub mod settings;
pub use settings::*;

/// Watermark text used when the caller does not supply one
pub const DEFAULT_WATERMARK_TEXT: &str = "Made with 3S";

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

impl MediaKind {
    /// Derive the kind from a MIME-like codec identifier such as `video/h264`
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().map(str::to_ascii_lowercase).as_deref() {
            Some("video") => MediaKind::Video,
            Some("audio") => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Other => "other",
        }
    }

    /// Kinds that may be carried into the merged output, in planning order
    pub fn is_mergeable(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sample flags copied verbatim from source to output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFlags {
    pub key_frame: bool,
}

/// One encoded media unit. All timestamps are microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub pts_us: i64,
    #[serde(default)]
    pub dts_us: Option<i64>,
    #[serde(default)]
    pub duration_us: i64,
    #[serde(default)]
    pub flags: SampleFlags,
    pub data: Vec<u8>,
}

impl Sample {
    pub fn new(pts_us: i64, duration_us: i64, key_frame: bool, data: Vec<u8>) -> Self {
        Self {
            pts_us,
            dts_us: None,
            duration_us,
            flags: SampleFlags { key_frame },
            data,
        }
    }

    /// Decode-order timestamp, falling back to the presentation timestamp
    pub fn decode_time_us(&self) -> i64 {
        self.dts_us.unwrap_or(self.pts_us)
    }

    pub fn end_us(&self) -> i64 {
        self.pts_us + self.duration_us.max(0)
    }

    /// Shift both timestamps by `offset_us`; size, flags and payload are untouched
    pub fn rebased(mut self, offset_us: i64) -> Self {
        self.pts_us += offset_us;
        self.dts_us = self.dts_us.map(|dts| dts + offset_us);
        self
    }
}

/// A track as seen by the pipeline. `F` is the toolkit's format descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo<F> {
    /// Source-order index within its container
    pub index: usize,
    pub kind: MediaKind,
    /// MIME-like codec identifier, e.g. `video/h264`
    pub codec: String,
    pub duration_us: Option<i64>,
    pub format: F,
}

impl<F> TrackInfo<F> {
    pub fn describe(&self) -> TrackDescription {
        TrackDescription {
            index: self.index,
            kind: self.kind,
            codec: self.codec.clone(),
            duration_us: self.duration_us,
        }
    }
}

/// Toolkit-independent view of a track, used in reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDescription {
    pub index: usize,
    pub kind: MediaKind,
    pub codec: String,
    pub duration_us: Option<i64>,
}

/// Running output cursor. Passed into each clip step and returned advanced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeline {
    current_offset_us: i64,
}

impl Timeline {
    pub fn start() -> Self {
        Self::default()
    }

    pub fn offset_us(&self) -> i64 {
        self.current_offset_us
    }

    /// Move a clip-relative sample onto the output timeline
    pub fn place(&self, sample: Sample) -> Sample {
        sample.rebased(self.current_offset_us)
    }

    /// Never decrements; negative durations count as zero
    pub fn advanced_by(self, duration_us: i64) -> Self {
        Self {
            current_offset_us: self.current_offset_us + duration_us.max(0),
        }
    }
}

/// 24-bit RGB color, serialized as `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const WHITE: RgbColor = RgbColor { r: 0xff, g: 0xff, b: 0xff };
    pub const BLACK: RgbColor = RgbColor { r: 0, g: 0, b: 0 };

    /// Accepts `#RRGGBB`, `0xRRGGBB`, `RRGGBB`, `white` and `black`
    pub fn parse(value: &str) -> Result<Self, MergeError> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "white" => return Ok(Self::WHITE),
            "black" => return Ok(Self::BLACK),
            _ => {}
        }

        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MergeError::InvalidRequest(format!(
                "Invalid color '{}'. Expected #RRGGBB",
                value
            )));
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|e| MergeError::InvalidRequest(format!("Invalid color '{}': {}", value, e)))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// `0xRRGGBB`, the form FFmpeg color options accept
    pub fn to_hex(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for RgbColor {
    type Error = MergeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RgbColor::parse(&value)
    }
}

impl From<RgbColor> for String {
    fn from(color: RgbColor) -> Self {
        format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b)
    }
}

/// Normalized position, each axis in -1.0..=1.0; (1, -1) is bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

/// Normalized scale relative to the frame, each axis in (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayScale {
    pub x: f64,
    pub y: f64,
}

/// Static text layer composed onto every clip's video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayDescriptor {
    pub text: String,
    pub color: RgbColor,
    /// 0 (transparent) to 255 (opaque)
    pub opacity: u8,
    pub anchor: Anchor,
    pub scale: OverlayScale,
}

impl Default for OverlayDescriptor {
    fn default() -> Self {
        Self {
            text: DEFAULT_WATERMARK_TEXT.to_string(),
            color: RgbColor::WHITE,
            opacity: 160,
            anchor: Anchor { x: 0.90, y: -0.90 },
            scale: OverlayScale { x: 0.35, y: 0.40 },
        }
    }
}

impl OverlayDescriptor {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.text.trim().is_empty() {
            return Err(MergeError::InvalidRequest(
                "Overlay text cannot be empty".to_string(),
            ));
        }
        for (axis, value) in [("x", self.anchor.x), ("y", self.anchor.y)] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(MergeError::InvalidRequest(format!(
                    "Overlay anchor {} must be within -1.0..=1.0, got {}",
                    axis, value
                )));
            }
        }
        for (axis, value) in [("x", self.scale.x), ("y", self.scale.y)] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(MergeError::InvalidRequest(format!(
                    "Overlay scale {} must be within (0.0, 1.0], got {}",
                    axis, value
                )));
            }
        }
        Ok(())
    }

    /// Glyph height for a frame of `frame_height` pixels, never below 8px
    pub fn font_size_px(&self, frame_height: u32) -> u32 {
        let size = (frame_height as f64 * 0.1 * self.scale.y).round() as u32;
        size.max(8)
    }

    /// 0.0 = left edge, 1.0 = right edge
    pub fn horizontal_fraction(&self) -> f64 {
        (self.anchor.x + 1.0) / 2.0
    }

    /// 0.0 = top edge, 1.0 = bottom edge
    pub fn vertical_fraction(&self) -> f64 {
        (1.0 - self.anchor.y) / 2.0
    }

    pub fn alpha(&self) -> f64 {
        self.opacity as f64 / 255.0
    }
}

/// Merge request as received from a caller; every field may be absent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MergeRequest {
    pub clip_paths: Option<Vec<String>>,
    pub output_path: Option<String>,
    pub overlay: Option<OverlayDescriptor>,
}

impl MergeRequest {
    pub fn new(clip_paths: Vec<String>, output_path: impl Into<String>) -> Self {
        Self {
            clip_paths: Some(clip_paths),
            output_path: Some(output_path.into()),
            overlay: None,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayDescriptor) -> Self {
        self.overlay = Some(overlay);
        self
    }
}

/// Request accepted by the validator; immutable from here on
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    clips: Vec<PathBuf>,
    output: PathBuf,
    overlay: Option<OverlayDescriptor>,
}

impl ValidatedRequest {
    pub(crate) fn new(
        clips: Vec<PathBuf>,
        output: PathBuf,
        overlay: Option<OverlayDescriptor>,
    ) -> Self {
        Self {
            clips,
            output,
            overlay,
        }
    }

    /// Never empty
    pub fn clips(&self) -> &[PathBuf] {
        &self.clips
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn overlay(&self) -> Option<&OverlayDescriptor> {
        self.overlay.as_ref()
    }
}

/// Per-output-track totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub kind: MediaKind,
    pub samples: u64,
    /// Samples whose timestamps were clamped to keep the track monotonic
    pub adjusted: u64,
    pub end_us: i64,
}

/// Result of a successful merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSummary {
    pub output_path: PathBuf,
    pub clip_count: usize,
    /// Final timeline offset
    pub duration_us: i64,
    pub overlay_applied: bool,
    pub tracks: Vec<TrackSummary>,
}

#[cfg(test)]
mod tests;
