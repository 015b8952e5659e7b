// Verify interactor - Re-reads a merged file and checks its timestamps

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{MediaError, MediaResult};
use crate::output::verifier::{verify_output, VerificationReport};
use crate::ports::{LogPort, MediaToolkit};

/// Interactor for output verification use case
pub struct VerifyInteractor<T: MediaToolkit> {
    toolkit: Arc<T>,
    log_port: Arc<dyn LogPort>,
}

impl<T: MediaToolkit + 'static> VerifyInteractor<T> {
    pub fn new(toolkit: Arc<T>, log_port: Arc<dyn LogPort>) -> Self {
        Self { toolkit, log_port }
    }

    pub async fn verify(&self, path: PathBuf) -> MediaResult<VerificationReport> {
        let toolkit = Arc::clone(&self.toolkit);
        let report = tokio::task::spawn_blocking(move || verify_output(toolkit.as_ref(), &path))
            .await
            .map_err(|e| MediaError::WorkerFailed {
                message: e.to_string(),
            })??;

        if report.is_monotonic() {
            self.log_port
                .info(&format!("Verified {} tracks", report.tracks.len()))
                .await;
        } else {
            self.log_port
                .warn("Output has tracks whose timestamps step backwards")
                .await;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_media::{MemoryContainer, MemoryToolkit};
    use crate::adapters::tracing_log::TracingLogAdapter;
    use crate::domain::model::MediaKind;

    #[tokio::test]
    async fn test_verify_reports_tracks() {
        let toolkit = MemoryToolkit::new();
        toolkit.register("merged.mp4", MemoryContainer::clip(1_500_000));
        let interactor =
            VerifyInteractor::new(Arc::new(toolkit), Arc::new(TracingLogAdapter::default()));

        let report = interactor.verify(PathBuf::from("merged.mp4")).await.unwrap();
        assert!(report.is_monotonic());
        assert_eq!(report.duration_us(MediaKind::Video), Some(1_500_000));
        assert!(report.track(MediaKind::Audio).is_some());
    }

    #[tokio::test]
    async fn test_verify_missing_file() {
        let interactor = VerifyInteractor::new(
            Arc::new(MemoryToolkit::new()),
            Arc::new(TracingLogAdapter::default()),
        );
        let err = interactor.verify(PathBuf::from("missing.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::OpenFailed { .. }));
    }
}
