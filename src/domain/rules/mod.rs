// Domain rules - Request validation and sequencing policies

use std::path::PathBuf;

use crate::domain::errors::MergeError;
use crate::domain::model::*;

/// Validates raw merge requests before any I/O happens
pub struct RequestValidator;

impl RequestValidator {
    /// Accept `request` or reject it with `InvalidRequest`. Touches no files.
    pub fn validate(request: MergeRequest) -> Result<ValidatedRequest, MergeError> {
        let clip_paths = request
            .clip_paths
            .ok_or_else(|| MergeError::InvalidRequest("Clip list is required".to_string()))?;
        let output_path = request
            .output_path
            .ok_or_else(|| MergeError::InvalidRequest("Output path is required".to_string()))?;

        if clip_paths.is_empty() {
            return Err(MergeError::InvalidRequest(
                "Clip list cannot be empty".to_string(),
            ));
        }
        if output_path.trim().is_empty() {
            return Err(MergeError::InvalidRequest(
                "Output path cannot be empty".to_string(),
            ));
        }

        let mut clips = Vec::with_capacity(clip_paths.len());
        for (index, path) in clip_paths.into_iter().enumerate() {
            if path.trim().is_empty() {
                return Err(MergeError::InvalidRequest(format!(
                    "Clip path at index {} is empty",
                    index
                )));
            }
            clips.push(PathBuf::from(path));
        }

        let output = PathBuf::from(output_path);
        if let Some(index) = clips.iter().position(|clip| clip == &output) {
            return Err(MergeError::InvalidRequest(format!(
                "Output path is the same as clip {}",
                index
            )));
        }

        if let Some(overlay) = &request.overlay {
            overlay.validate()?;
        }

        Ok(ValidatedRequest::new(clips, output, request.overlay))
    }
}

/// First track of `kind` in source order
pub fn find_track<F>(tracks: &[TrackInfo<F>], kind: MediaKind) -> Option<&TrackInfo<F>> {
    tracks.iter().find(|track| track.kind == kind)
}

/// How far the timeline moves after a clip has been copied.
///
/// The container's video duration wins; when the container does not record
/// one, the end of the last copied video sample is used. Clips without video
/// do not move the timeline.
pub fn clip_advance_us(video_duration_us: Option<i64>, observed_video_end_us: Option<i64>) -> i64 {
    video_duration_us
        .filter(|duration| *duration > 0)
        .or(observed_video_end_us)
        .unwrap_or(0)
        .max(0)
}
