// Merge interactor - Orchestrates the merge use case

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::MergeError;
use crate::domain::model::*;
use crate::domain::rules::RequestValidator;
use crate::engine::MergeEngine;
use crate::ports::{LogPort, MediaToolkit};

/// Status reported for a completed merge
pub const SUCCESS_STATUS: &str = "SUCCESS";

/// Successful merge as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub status: String,
    pub output_path: String,
    pub clip_count: usize,
    pub duration_us: i64,
    pub overlay_applied: bool,
    pub tracks: Vec<TrackSummary>,
    pub completed_at: DateTime<Utc>,
}

impl From<MergeSummary> for MergeResponse {
    fn from(summary: MergeSummary) -> Self {
        Self {
            status: SUCCESS_STATUS.to_string(),
            output_path: summary.output_path.to_string_lossy().to_string(),
            clip_count: summary.clip_count,
            duration_us: summary.duration_us,
            overlay_applied: summary.overlay_applied,
            tracks: summary.tracks,
            completed_at: Utc::now(),
        }
    }
}

/// Interactor for the merge use case
pub struct MergeInteractor<T: MediaToolkit> {
    engine: Arc<MergeEngine<T>>,
    log_port: Arc<dyn LogPort>,
}

impl<T: MediaToolkit + 'static> MergeInteractor<T> {
    pub fn new(engine: Arc<MergeEngine<T>>, log_port: Arc<dyn LogPort>) -> Self {
        Self { engine, log_port }
    }

    /// Validate `request` and run it to completion on a blocking worker.
    /// Resolves exactly once, with the merged output or the reason it failed.
    pub async fn merge(
        &self,
        request: MergeRequest,
        cancel: CancellationToken,
    ) -> Result<MergeResponse, MergeError> {
        let validated = match RequestValidator::validate(request) {
            Ok(validated) => validated,
            Err(err) => {
                self.log_port
                    .warn(&format!("Rejected merge request: {}", err))
                    .await;
                return Err(err);
            }
        };

        self.log_port
            .info(&format!(
                "Merging {} clips{}",
                validated.clips().len(),
                if validated.overlay().is_some() {
                    " with overlay"
                } else {
                    ""
                }
            ))
            .await;

        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || engine.run(&validated, &cancel))
            .await
            .map_err(|e| MergeError::WriteFailure(format!("merge worker failed: {}", e)))
            .and_then(|outcome| outcome);

        match result {
            Ok(summary) => {
                let response = MergeResponse::from(summary);
                self.log_port
                    .info(&format!(
                        "Merge finished: {} clips, {:.3}s",
                        response.clip_count,
                        response.duration_us as f64 / 1_000_000.0
                    ))
                    .await;
                Ok(response)
            }
            Err(err) => {
                self.log_port
                    .error(&format!("Merge failed [{}]: {}", err.code(), err))
                    .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_media::{MemoryContainer, MemoryToolkit};
    use crate::adapters::tracing_log::TracingLogAdapter;
    use tempfile::TempDir;

    fn interactor(toolkit: MemoryToolkit) -> MergeInteractor<MemoryToolkit> {
        let engine = MergeEngine::new(Arc::new(toolkit), OutputOptions::default());
        MergeInteractor::new(Arc::new(engine), Arc::new(TracingLogAdapter::default()))
    }

    #[tokio::test]
    async fn test_merge_reports_success() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("vlog.mp4");
        let toolkit = MemoryToolkit::new();
        toolkit.register("a.mp4", MemoryContainer::clip(2_000_000));
        toolkit.register("b.mp4", MemoryContainer::clip(1_500_000));

        let request = MergeRequest::new(
            vec!["a.mp4".to_string(), "b.mp4".to_string()],
            output.display().to_string(),
        );
        let response = interactor(toolkit)
            .merge(request, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status, SUCCESS_STATUS);
        assert_eq!(response.output_path, output.display().to_string());
        assert_eq!(response.duration_us, 3_500_000);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["clipCount"], 2);
        assert!(json["completedAt"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let toolkit = MemoryToolkit::new();
        let request = MergeRequest {
            clip_paths: Some(vec![]),
            output_path: Some("never.mp4".to_string()),
            overlay: None,
        };
        let interactor = interactor(toolkit);
        let err = interactor
            .merge(request, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_ARGS");
        assert_eq!(interactor.engine.toolkit().opened_total(), 0);
        assert!(!std::path::Path::new("never.mp4").exists());
    }
}
