//! Clip sequencing
//!
//! Appends one clip onto the output. The timeline is passed in and the
//! advanced timeline is handed back, so each step depends only on its inputs.

use std::path::Path;

use tracing::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::MergeError;
use crate::domain::model::{MediaKind, Sample, Timeline};
use crate::domain::rules::{clip_advance_us, find_track};
use crate::engine::check_cancelled;
use crate::engine::failure::FailureReporter;
use crate::output::OutputContainer;
use crate::planner::TrackLayout;
use crate::ports::{ClipSource, MediaToolkit, OutputSink, OverlayStage};

/// Everything a clip step needs besides the clip itself
pub struct SequenceContext<'a, T: MediaToolkit> {
    pub toolkit: &'a T,
    pub layout: &'a TrackLayout,
    pub output: &'a mut OutputContainer<T::Output>,
    pub overlay: Option<&'a mut T::Overlay>,
    pub cancel: &'a CancellationToken,
}

/// What one clip contributed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipOutcome {
    /// Timeline for the next clip
    pub timeline: Timeline,
    pub advance_us: i64,
    pub samples: u64,
}

#[derive(Debug, Default)]
struct CopyStats {
    samples: u64,
    /// Clip-relative end of the last copied sample
    end_us: Option<i64>,
}

impl CopyStats {
    fn observe(&mut self, sample: &Sample) {
        self.samples += 1;
        let end = sample.end_us();
        self.end_us = Some(self.end_us.map_or(end, |current| current.max(end)));
    }
}

/// Copy clip `index` onto the output at `timeline` and return the advanced timeline
pub fn sequence_clip<T: MediaToolkit>(
    ctx: &mut SequenceContext<'_, T>,
    index: usize,
    path: &Path,
    timeline: Timeline,
) -> Result<ClipOutcome, MergeError> {
    let mut clip = ctx
        .toolkit
        .open_clip(path)
        .map_err(|e| FailureReporter::unreadable(index, &e))?;
    let tracks = clip.list_tracks();
    let layout = ctx.layout;

    let mut video_duration_us = None;
    let mut observed_video_end_us = None;
    let mut samples = 0;

    for kind in layout.kinds() {
        let Some(source) = find_track(&tracks, kind) else {
            debug!(clip_index = index, %kind, "Clip has no track of this kind");
            continue;
        };
        let Some(out_track) = layout.output_track(kind) else {
            continue;
        };

        clip.select_track(source.index)
            .map_err(|e| FailureReporter::unreadable(index, &e))?;
        clip.seek_to_sync(0)
            .map_err(|e| FailureReporter::unreadable(index, &e))?;

        let stats = match (kind, ctx.overlay.as_deref_mut()) {
            (MediaKind::Video, Some(overlay)) => {
                overlay
                    .begin_clip(source)
                    .map_err(|e| FailureReporter::write_failure("overlay setup", &e))?;
                copy_composed(&mut clip, overlay, &mut *ctx.output, out_track, timeline, ctx.cancel)?
            }
            _ => copy_track(&mut clip, &mut *ctx.output, out_track, timeline, ctx.cancel)?,
        };

        if kind == MediaKind::Video {
            video_duration_us = source.duration_us;
            observed_video_end_us = stats.end_us;
        }
        samples += stats.samples;
    }

    drop(clip);

    let advance_us = clip_advance_us(video_duration_us, observed_video_end_us);
    if observed_video_end_us.is_none() && samples > 0 {
        warn!(
            clip_index = index,
            "Clip has no video samples; timeline not advanced, next clip will overlap its audio"
        );
    }
    info!(
        clip_index = index,
        offset_us = timeline.offset_us(),
        advance_us,
        samples,
        "Clip appended"
    );

    Ok(ClipOutcome {
        timeline: timeline.advanced_by(advance_us),
        advance_us,
        samples,
    })
}

/// Straight copy: timestamps are rebased, everything else passes through
fn copy_track<C, S>(
    clip: &mut C,
    output: &mut OutputContainer<S>,
    out_track: usize,
    timeline: Timeline,
    cancel: &CancellationToken,
) -> Result<CopyStats, MergeError>
where
    C: ClipSource,
    S: OutputSink,
{
    let mut stats = CopyStats::default();
    while let Some(sample) = next_sample(clip, cancel)? {
        stats.observe(&sample);
        output
            .write_sample(out_track, timeline.place(sample))
            .map_err(|e| FailureReporter::write_failure("write sample", &e))?;
    }
    Ok(stats)
}

/// Video copy through the overlay stage
fn copy_composed<C, O, S>(
    clip: &mut C,
    overlay: &mut O,
    output: &mut OutputContainer<S>,
    out_track: usize,
    timeline: Timeline,
    cancel: &CancellationToken,
) -> Result<CopyStats, MergeError>
where
    C: ClipSource,
    O: OverlayStage,
    S: OutputSink,
{
    let mut stats = CopyStats::default();
    while let Some(sample) = next_sample(clip, cancel)? {
        stats.observe(&sample);
        let composed = overlay
            .compose(sample)
            .map_err(|e| FailureReporter::write_failure("overlay compose", &e))?;
        write_all(output, out_track, timeline, composed)?;
    }

    let tail = overlay
        .finish_clip()
        .map_err(|e| FailureReporter::write_failure("overlay flush", &e))?;
    write_all(output, out_track, timeline, tail)?;
    Ok(stats)
}

fn next_sample<C: ClipSource>(
    clip: &mut C,
    cancel: &CancellationToken,
) -> Result<Option<Sample>, MergeError> {
    check_cancelled(cancel)?;
    clip.read_next_sample()
        .map_err(|e| FailureReporter::write_failure("read sample", &e))
}

fn write_all<S: OutputSink>(
    output: &mut OutputContainer<S>,
    out_track: usize,
    timeline: Timeline,
    samples: Vec<Sample>,
) -> Result<(), MergeError> {
    for sample in samples {
        output
            .write_sample(out_track, timeline.place(sample))
            .map_err(|e| FailureReporter::write_failure("write sample", &e))?;
    }
    Ok(())
}
