// Inspect interactor - Reports the tracks of each clip before a merge

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::errors::MergeError;
use crate::domain::model::{MediaKind, TrackDescription};
use crate::engine::failure::FailureReporter;
use crate::planner::TrackPlan;
use crate::ports::{ClipSource, LogPort, MediaToolkit};

/// Tracks of one clip, or the reason it could not be read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipReport {
    pub index: usize,
    pub path: String,
    pub readable: bool,
    pub tracks: Vec<TrackDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectResponse {
    pub clips: Vec<ClipReport>,
    /// Output tracks a merge of these clips would declare
    pub planned_kinds: Vec<MediaKind>,
    /// Index of the first clip that could not be read
    pub first_unreadable: Option<usize>,
}

/// Interactor for the inspect use case
pub struct InspectInteractor<T: MediaToolkit> {
    toolkit: Arc<T>,
    log_port: Arc<dyn LogPort>,
}

impl<T: MediaToolkit + 'static> InspectInteractor<T> {
    pub fn new(toolkit: Arc<T>, log_port: Arc<dyn LogPort>) -> Self {
        Self { toolkit, log_port }
    }

    pub async fn inspect(&self, clips: Vec<PathBuf>) -> Result<InspectResponse, MergeError> {
        if clips.is_empty() {
            return Err(MergeError::InvalidRequest(
                "No clips to inspect".to_string(),
            ));
        }
        self.log_port
            .info(&format!("Inspecting {} clips", clips.len()))
            .await;

        let toolkit = Arc::clone(&self.toolkit);
        let response = tokio::task::spawn_blocking(move || inspect_clips(toolkit.as_ref(), &clips))
            .await
            .map_err(|e| MergeError::WriteFailure(format!("inspect worker failed: {}", e)))?;

        if let Some(index) = response.first_unreadable {
            self.log_port
                .warn(&format!("Clip {} could not be read", index))
                .await;
        }
        Ok(response)
    }
}

fn inspect_clips<T: MediaToolkit>(toolkit: &T, clips: &[PathBuf]) -> InspectResponse {
    let mut reports = Vec::with_capacity(clips.len());
    let mut planned_kinds = Vec::new();

    for (index, path) in clips.iter().enumerate() {
        let tracks = match toolkit.open_clip(path) {
            Ok(clip) => Some(clip.list_tracks()),
            Err(e) => {
                FailureReporter::unreadable(index, &e);
                None
            }
        };

        if index == 0 {
            if let Some(tracks) = &tracks {
                planned_kinds = TrackPlan::from_tracks(tracks).kinds();
            }
        }
        debug!(clip_index = index, readable = tracks.is_some(), "Inspected clip");

        reports.push(ClipReport {
            index,
            path: path.display().to_string(),
            readable: tracks.is_some(),
            tracks: tracks
                .unwrap_or_default()
                .iter()
                .map(|track| track.describe())
                .collect(),
        });
    }

    let first_unreadable = reports.iter().find(|r| !r.readable).map(|r| r.index);
    InspectResponse {
        clips: reports,
        planned_kinds,
        first_unreadable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_media::{MemoryContainer, MemoryToolkit, MemoryTrack};
    use crate::adapters::tracing_log::TracingLogAdapter;

    #[tokio::test]
    async fn test_inspect_lists_tracks_and_unreadable_clips() {
        let toolkit = MemoryToolkit::new();
        toolkit.register(
            "a.mp4",
            MemoryContainer::new(vec![
                MemoryTrack::subtitles(),
                MemoryTrack::video(1_000_000, 40_000, 25),
            ]),
        );
        let interactor =
            InspectInteractor::new(Arc::new(toolkit), Arc::new(TracingLogAdapter::default()));

        let response = interactor
            .inspect(vec![PathBuf::from("a.mp4"), PathBuf::from("gone.mp4")])
            .await
            .unwrap();

        assert_eq!(response.clips.len(), 2);
        assert_eq!(response.clips[0].tracks.len(), 2);
        assert_eq!(response.planned_kinds, vec![MediaKind::Video]);
        assert!(!response.clips[1].readable);
        assert_eq!(response.first_unreadable, Some(1));
    }

    #[tokio::test]
    async fn test_inspect_requires_clips() {
        let interactor = InspectInteractor::new(
            Arc::new(MemoryToolkit::new()),
            Arc::new(TracingLogAdapter::default()),
        );
        let err = interactor.inspect(Vec::new()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGS");
    }
}
