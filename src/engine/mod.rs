//! Merge engine
//!
//! Drives one merge from a validated request to a finalized output: plan the
//! tracks from the first clip, build the optional overlay, then append every
//! clip in order on a single timeline.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::MergeError;
use crate::domain::model::{MediaKind, MergeSummary, OutputOptions, Timeline, ValidatedRequest};
use crate::output::{aliased_clip, OutputContainer};
use crate::planner::{declare, plan_output};
use crate::ports::MediaToolkit;

pub mod failure;
pub mod sequencer;

use failure::FailureReporter;
use sequencer::{sequence_clip, SequenceContext};

/// `Err(Cancelled)` once `cancel` has been triggered
pub fn check_cancelled(cancel: &CancellationToken) -> Result<(), MergeError> {
    if cancel.is_cancelled() {
        Err(MergeError::Cancelled)
    } else {
        Ok(())
    }
}

/// Merge engine bound to one media toolkit
pub struct MergeEngine<T: MediaToolkit> {
    toolkit: Arc<T>,
    options: OutputOptions,
}

impl<T: MediaToolkit> MergeEngine<T> {
    pub fn new(toolkit: Arc<T>, options: OutputOptions) -> Self {
        Self { toolkit, options }
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    /// Merge `request.clips()` into `request.output()`. On any error the
    /// output path is left empty. An output that is the same file as one of
    /// the clips is rejected before anything is opened or removed.
    pub fn run(
        &self,
        request: &ValidatedRequest,
        cancel: &CancellationToken,
    ) -> Result<MergeSummary, MergeError> {
        let started = Instant::now();
        info!(
            toolkit = self.toolkit.name(),
            clips = request.clips().len(),
            overlay = request.overlay().is_some(),
            "Starting merge"
        );

        if let Some(index) = aliased_clip(request.clips(), request.output()) {
            warn!(clip_index = index, "Output path resolves to an input clip");
            return Err(MergeError::InvalidRequest(format!(
                "Output path is the same file as clip {}",
                index
            )));
        }

        let reporter = FailureReporter::new(request.output());
        let summary = reporter.conclude(self.execute(request, cancel))?;

        info!(
            duration_us = summary.duration_us,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Merge completed"
        );
        Ok(summary)
    }

    fn execute(
        &self,
        request: &ValidatedRequest,
        cancel: &CancellationToken,
    ) -> Result<MergeSummary, MergeError> {
        check_cancelled(cancel)?;
        let toolkit = self.toolkit.as_ref();
        let clips = request.clips();

        let plan = plan_output(toolkit, &clips[0])?;

        let mut overlay = match (request.overlay(), plan.template(MediaKind::Video)) {
            (Some(descriptor), Some(video)) => Some(
                toolkit
                    .create_overlay(descriptor, video)
                    .map_err(|e| FailureReporter::write_failure("overlay setup", &e))?,
            ),
            (Some(_), None) => {
                warn!("First clip has no video track; overlay skipped");
                None
            }
            (None, _) => None,
        };
        let overlay_applied = overlay.is_some();

        let mut output = OutputContainer::create(toolkit, request.output(), &self.options)
            .map_err(|e| FailureReporter::write_failure("create output", &e))?;
        let layout = declare(&plan, overlay.as_ref(), &mut output)?;
        output
            .start()
            .map_err(|e| FailureReporter::write_failure("start output", &e))?;

        let mut timeline = Timeline::start();
        {
            let mut ctx = SequenceContext {
                toolkit,
                layout: &layout,
                output: &mut output,
                overlay: overlay.as_mut(),
                cancel,
            };
            for (index, path) in clips.iter().enumerate() {
                check_cancelled(cancel)?;
                timeline = sequence_clip(&mut ctx, index, path, timeline)?.timeline;
            }
        }

        check_cancelled(cancel)?;
        let tracks = output
            .finalize()
            .map_err(|e| FailureReporter::write_failure("finalize output", &e))?;

        Ok(MergeSummary {
            output_path: request.output().to_path_buf(),
            clip_count: clips.len(),
            duration_us: timeline.offset_us(),
            overlay_applied,
            tracks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_media::{overlay_stamp, MemoryContainer, MemoryToolkit, MemoryTrack};
    use crate::domain::model::{MergeRequest, OverlayDescriptor};
    use crate::domain::rules::RequestValidator;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn engine(toolkit: MemoryToolkit) -> MergeEngine<MemoryToolkit> {
        MergeEngine::new(Arc::new(toolkit), OutputOptions::default())
    }

    fn request(clips: &[&str], output: &PathBuf) -> ValidatedRequest {
        let clips = clips.iter().map(|c| c.to_string()).collect();
        RequestValidator::validate(MergeRequest::new(clips, output.display().to_string())).unwrap()
    }

    #[test]
    fn test_cancellation_seen_through_clones() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(check_cancelled(&token).is_ok());
        other.cancel();
        assert_eq!(check_cancelled(&token), Err(MergeError::Cancelled));
    }

    #[test]
    fn test_run_sums_clip_durations() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let toolkit = MemoryToolkit::new();
        toolkit.register("a.mp4", MemoryContainer::clip(2_000_000));
        toolkit.register("b.mp4", MemoryContainer::clip(1_500_000));
        let engine = engine(toolkit);

        let summary = engine
            .run(&request(&["a.mp4", "b.mp4"], &output), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.clip_count, 2);
        assert_eq!(summary.duration_us, 3_500_000);
        assert!(!summary.overlay_applied);
        assert_eq!(summary.tracks.len(), 2);
        assert!(output.exists());
        assert_eq!(engine.toolkit().open_handles(), 0);
    }

    #[test]
    fn test_failure_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        std::fs::write(&output, b"previous").unwrap();
        let toolkit = MemoryToolkit::new();
        toolkit.register("a.mp4", MemoryContainer::clip(1_000_000));
        let engine = engine(toolkit);

        let err = engine
            .run(&request(&["a.mp4", "missing.mp4"], &output), &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err, MergeError::ClipUnreadable { index: 1 });
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_output_aliasing_a_clip_is_rejected_and_clip_kept() {
        let dir = TempDir::new().unwrap();
        let clip = dir.path().join("a.mp4");
        MemoryContainer::clip(1_000_000).save(&clip).unwrap();
        let alias = dir.path().join("sub").join("..").join("a.mp4");
        let toolkit = MemoryToolkit::new();
        let engine = engine(toolkit);

        let validated = RequestValidator::validate(MergeRequest::new(
            vec![clip.display().to_string(), "missing.mp4".to_string()],
            alias.display().to_string(),
        ))
        .unwrap();
        let err = engine.run(&validated, &CancellationToken::new()).unwrap_err();

        assert_eq!(err.code(), "INVALID_ARGS");
        assert!(clip.exists());
        assert!(MemoryContainer::load(&clip).is_ok());
        assert!(!dir.path().join("sub").exists());
        assert_eq!(engine.toolkit().opened_total(), 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let toolkit = MemoryToolkit::new();
        toolkit.register("a.mp4", MemoryContainer::clip(1_000_000));
        let token = CancellationToken::new();
        token.cancel();

        let err = engine(toolkit)
            .run(&request(&["a.mp4"], &output), &token)
            .unwrap_err();
        assert_eq!(err.code(), "EXPORT_CANCELLED");
        assert!(!output.exists());
    }

    #[test]
    fn test_overlay_skipped_without_video() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        let toolkit = MemoryToolkit::new();
        toolkit.register(
            "voice.m4a",
            MemoryContainer::new(vec![MemoryTrack::audio(1_000_000, 21_333)]),
        );
        let validated = RequestValidator::validate(
            MergeRequest::new(vec!["voice.m4a".into()], output.display().to_string())
                .with_overlay(OverlayDescriptor::with_text("Trip")),
        )
        .unwrap();

        let summary = engine(toolkit).run(&validated, &CancellationToken::new()).unwrap();
        assert!(!summary.overlay_applied);
        let merged = MemoryContainer::load(&output).unwrap();
        let audio = merged.track(MediaKind::Audio).unwrap();
        assert!(audio.samples.iter().all(|s| !s.data.starts_with(&overlay_stamp("Trip"))));
    }
}
