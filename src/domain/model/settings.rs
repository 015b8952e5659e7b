//! Merge settings loaded from configuration

use serde::{Deserialize, Serialize};

use crate::domain::model::{
    Anchor, OverlayDescriptor, OverlayScale, RgbColor, DEFAULT_WATERMARK_TEXT,
};
use crate::error::ConfigError;

/// Full configuration model. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub watermark: WatermarkSettings,
    pub encoder: EncoderSettings,
    pub output: OutputOptions,
    pub logging: LoggingSettings,
}

impl MergeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.watermark
            .descriptor()
            .validate()
            .map_err(|e| ConfigError::Invalid {
                message: format!("watermark: {}", e),
            })?;

        if self.encoder.crf > 51 {
            return Err(ConfigError::Invalid {
                message: format!("encoder.crf must be 0-51, got {}", self.encoder.crf),
            });
        }
        if self.encoder.video_encoder.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "encoder.video_encoder cannot be empty".to_string(),
            });
        }
        if let Some(degrees) = self.output.orientation_hint {
            if !matches!(degrees, 0 | 90 | 180 | 270) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "output.orientation_hint must be 0, 90, 180 or 270, got {}",
                        degrees
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Default overlay applied when a caller asks for a watermark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSettings {
    /// Watermark callers that do not say otherwise
    pub enabled: bool,
    pub text: String,
    pub color: RgbColor,
    pub opacity: u8,
    pub anchor_x: f64,
    pub anchor_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// TrueType font for drawtext; fontconfig default when unset
    pub font_file: Option<String>,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        let overlay = OverlayDescriptor::default();
        Self {
            enabled: true,
            text: DEFAULT_WATERMARK_TEXT.to_string(),
            color: overlay.color,
            opacity: overlay.opacity,
            anchor_x: overlay.anchor.x,
            anchor_y: overlay.anchor.y,
            scale_x: overlay.scale.x,
            scale_y: overlay.scale.y,
            font_file: None,
        }
    }
}

impl WatermarkSettings {
    pub fn descriptor(&self) -> OverlayDescriptor {
        OverlayDescriptor {
            text: self.text.clone(),
            color: self.color,
            opacity: self.opacity,
            anchor: Anchor {
                x: self.anchor_x,
                y: self.anchor_y,
            },
            scale: OverlayScale {
                x: self.scale_x,
                y: self.scale_y,
            },
        }
    }
}

/// Encoder used when the overlay forces the video track to be re-encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    pub video_encoder: String,
    pub preset: String,
    pub crf: u8,
    /// Encoder threads; all cores when unset
    pub threads: Option<usize>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video_encoder: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            threads: None,
        }
    }
}

impl EncoderSettings {
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Container-level output options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Rotation written on the video track, e.g. 90 for portrait playback
    pub orientation_hint: Option<u32>,
    /// Move the moov atom to the front of the file
    pub faststart: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            orientation_hint: None,
            faststart: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// `full`, `compact` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}
