// Platform channel - JSON method calls in, tagged responses out
//
// Mirrors the host-app method channel: one call names a method and carries a
// loose argument map; the answer is a success, an error with a code, or a
// not-implemented signal.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::app::merge_interactor::MergeInteractor;
use crate::domain::errors::MergeError;
use crate::domain::model::{MergeRequest, OverlayDescriptor, RgbColor, WatermarkSettings};
use crate::ports::{ConfigPort, MediaToolkit};

pub const MERGE_VIDEOS: &str = "mergeVideos";
pub const CONVERT_IMAGE_TO_VIDEO: &str = "convertImageToVideo";

/// One incoming call
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Outcome of a call, tagged by `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum ChannelResponse {
    #[serde(rename = "SUCCESS", rename_all = "camelCase")]
    Success { output_path: String },
    #[serde(rename = "ERROR")]
    Error {
        code: String,
        message: String,
        /// Clip marker such as `CLIP_ERROR_INDEX_1` for clip failures
        details: Option<String>,
    },
    #[serde(rename = "NOT_IMPLEMENTED")]
    NotImplemented { method: String },
}

impl From<&MergeError> for ChannelResponse {
    fn from(err: &MergeError) -> Self {
        ChannelResponse::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            details: err.marker(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeVideosArgs {
    #[serde(alias = "paths", alias = "inputPaths")]
    clip_paths: Option<Vec<String>>,
    output_path: Option<String>,
    watermark_text: Option<String>,
    watermark: Option<bool>,
    overlay: Option<OverlayArgs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverlayArgs {
    color: Option<RgbColor>,
    opacity: Option<u8>,
    anchor_x: Option<f64>,
    anchor_y: Option<f64>,
    scale_x: Option<f64>,
    scale_y: Option<f64>,
}

impl MergeVideosArgs {
    /// Build the merge request, filling overlay gaps from `defaults`
    fn into_request(self, defaults: &WatermarkSettings) -> MergeRequest {
        let wants_overlay = self.watermark.unwrap_or(
            defaults.enabled || self.overlay.is_some() || self.watermark_text.is_some(),
        );
        let overlay = wants_overlay.then(|| {
            let mut descriptor = defaults.descriptor();
            if let Some(text) = self.watermark_text {
                descriptor.text = text;
            }
            if let Some(args) = self.overlay {
                args.apply(&mut descriptor);
            }
            descriptor
        });

        MergeRequest {
            clip_paths: self.clip_paths,
            output_path: self.output_path,
            overlay,
        }
    }
}

impl OverlayArgs {
    fn apply(self, descriptor: &mut OverlayDescriptor) {
        if let Some(color) = self.color {
            descriptor.color = color;
        }
        if let Some(opacity) = self.opacity {
            descriptor.opacity = opacity;
        }
        if let Some(x) = self.anchor_x {
            descriptor.anchor.x = x;
        }
        if let Some(y) = self.anchor_y {
            descriptor.anchor.y = y;
        }
        if let Some(x) = self.scale_x {
            descriptor.scale.x = x;
        }
        if let Some(y) = self.scale_y {
            descriptor.scale.y = y;
        }
    }
}

/// Dispatches channel calls to the interactors
pub struct ChannelHandler<T: MediaToolkit> {
    merge_interactor: Arc<MergeInteractor<T>>,
    config_port: Arc<dyn ConfigPort>,
}

impl<T: MediaToolkit + 'static> ChannelHandler<T> {
    pub fn new(merge_interactor: Arc<MergeInteractor<T>>, config_port: Arc<dyn ConfigPort>) -> Self {
        Self {
            merge_interactor,
            config_port,
        }
    }

    /// Parse one JSON call and handle it
    pub async fn handle_json(&self, payload: &str, cancel: CancellationToken) -> ChannelResponse {
        match serde_json::from_str::<MethodCall>(payload) {
            Ok(call) => self.handle(call, cancel).await,
            Err(e) => {
                warn!(error = %e, "Malformed channel call");
                ChannelResponse::from(&MergeError::InvalidRequest(format!(
                    "Malformed method call: {}",
                    e
                )))
            }
        }
    }

    pub async fn handle(&self, call: MethodCall, cancel: CancellationToken) -> ChannelResponse {
        debug!(method = %call.method, "Channel call");
        match call.method.as_str() {
            MERGE_VIDEOS => self.merge_videos(call.arguments, cancel).await,
            CONVERT_IMAGE_TO_VIDEO => ChannelResponse::NotImplemented {
                method: call.method,
            },
            _ => {
                warn!(method = %call.method, "Unknown channel method");
                ChannelResponse::NotImplemented {
                    method: call.method,
                }
            }
        }
    }

    async fn merge_videos(&self, arguments: Value, cancel: CancellationToken) -> ChannelResponse {
        let args = if arguments.is_null() {
            MergeVideosArgs::default()
        } else {
            match serde_json::from_value::<MergeVideosArgs>(arguments) {
                Ok(args) => args,
                Err(e) => {
                    return ChannelResponse::from(&MergeError::InvalidRequest(format!(
                        "Invalid arguments: {}",
                        e
                    )))
                }
            }
        };

        let defaults = self.config_port.settings().await.watermark;
        let request = args.into_request(&defaults);
        match self.merge_interactor.merge(request, cancel).await {
            Ok(response) => ChannelResponse::Success {
                output_path: response.output_path,
            },
            Err(err) => ChannelResponse::from(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_media::{overlay_stamp, MemoryContainer, MemoryToolkit};
    use crate::adapters::toml_config::TomlConfigAdapter;
    use crate::adapters::tracing_log::TracingLogAdapter;
    use crate::domain::model::{MediaKind, MergeSettings, OutputOptions, DEFAULT_WATERMARK_TEXT};
    use crate::engine::MergeEngine;
    use serde_json::json;
    use tempfile::TempDir;

    fn handler(settings: MergeSettings) -> ChannelHandler<MemoryToolkit> {
        let toolkit = MemoryToolkit::new();
        toolkit.register("a.mp4", MemoryContainer::clip(1_000_000));
        toolkit.register("b.mp4", MemoryContainer::clip(500_000));
        let engine = MergeEngine::new(Arc::new(toolkit), OutputOptions::default());
        let merge = MergeInteractor::new(Arc::new(engine), Arc::new(TracingLogAdapter::default()));
        ChannelHandler::new(
            Arc::new(merge),
            Arc::new(TomlConfigAdapter::with_settings(settings)),
        )
    }

    #[tokio::test]
    async fn test_merge_videos_with_default_watermark() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("vlog.mp4");
        let call = json!({
            "method": "mergeVideos",
            "arguments": { "paths": ["a.mp4", "b.mp4"], "outputPath": output }
        });

        let response = handler(MergeSettings::default())
            .handle_json(&call.to_string(), CancellationToken::new())
            .await;
        assert_eq!(
            response,
            ChannelResponse::Success {
                output_path: output.display().to_string()
            }
        );

        let merged = MemoryContainer::load(&output).unwrap();
        let video = merged.track(MediaKind::Video).unwrap();
        let stamp = overlay_stamp(DEFAULT_WATERMARK_TEXT);
        assert!(video.samples.iter().all(|s| s.data.starts_with(&stamp)));
    }

    #[test]
    fn test_watermark_text_and_overlay_arguments() {
        let args: MergeVideosArgs = serde_json::from_value(json!({
            "inputPaths": ["a.mp4"],
            "outputPath": "out.mp4",
            "watermarkText": "Day 3",
            "overlay": { "color": "#FF0000", "opacity": 255, "anchorX": -0.5, "scaleY": 0.2 }
        }))
        .unwrap();
        let request = args.into_request(&WatermarkSettings::default());

        let overlay = request.overlay.unwrap();
        assert_eq!(overlay.text, "Day 3");
        assert_eq!(overlay.color, RgbColor { r: 0xff, g: 0, b: 0 });
        assert_eq!(overlay.opacity, 255);
        assert_eq!(overlay.anchor.x, -0.5);
        assert_eq!(overlay.anchor.y, -0.9);
        assert_eq!(overlay.scale.y, 0.2);
        assert_eq!(request.clip_paths, Some(vec!["a.mp4".to_string()]));
    }

    #[test]
    fn test_watermark_can_be_disabled() {
        let args: MergeVideosArgs = serde_json::from_value(json!({
            "clipPaths": ["a.mp4"],
            "outputPath": "out.mp4",
            "watermark": false
        }))
        .unwrap();
        assert!(args.into_request(&WatermarkSettings::default()).overlay.is_none());
    }

    #[tokio::test]
    async fn test_missing_arguments_are_invalid_args() {
        let response = handler(MergeSettings::default())
            .handle(
                MethodCall {
                    method: MERGE_VIDEOS.to_string(),
                    arguments: Value::Null,
                },
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(
            response,
            ChannelResponse::Error { ref code, .. } if code == "INVALID_ARGS"
        ));
    }

    #[tokio::test]
    async fn test_unreadable_clip_carries_marker() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("vlog.mp4");
        let call = MethodCall {
            method: MERGE_VIDEOS.to_string(),
            arguments: json!({ "clipPaths": ["a.mp4", "missing.mp4"], "outputPath": output }),
        };

        let response = handler(MergeSettings::default())
            .handle(call, CancellationToken::new())
            .await;
        match response {
            ChannelResponse::Error { code, details, .. } => {
                assert_eq!(code, "MERGE_ERROR");
                assert_eq!(details.as_deref(), Some("CLIP_ERROR_INDEX_1"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_convert_image_and_unknown_methods_are_not_implemented() {
        let handler = handler(MergeSettings::default());
        for method in [CONVERT_IMAGE_TO_VIDEO, "shareToInstagram"] {
            let response = handler
                .handle_json(&json!({ "method": method }).to_string(), CancellationToken::new())
                .await;
            assert_eq!(
                response,
                ChannelResponse::NotImplemented {
                    method: method.to_string()
                }
            );
        }
    }

    #[test]
    fn test_response_wire_shape() {
        let success = serde_json::to_value(ChannelResponse::Success {
            output_path: "/tmp/v.mp4".to_string(),
        })
        .unwrap();
        assert_eq!(success, json!({ "status": "SUCCESS", "outputPath": "/tmp/v.mp4" }));

        let error = serde_json::to_value(ChannelResponse::from(&MergeError::Cancelled)).unwrap();
        assert_eq!(error["status"], "ERROR");
        assert_eq!(error["code"], "EXPORT_CANCELLED");
        assert!(error["details"].is_null());
    }
}
