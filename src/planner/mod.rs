//! Output track planning
//!
//! The first clip decides the output layout: one output track per media kind
//! it carries, using its first track of that kind as the format template.

use std::path::Path;

use tracing::{debug, info};

use crate::domain::errors::MergeError;
use crate::domain::model::{MediaKind, TrackInfo};
use crate::engine::failure::FailureReporter;
use crate::output::OutputContainer;
use crate::ports::{ClipSource, MediaToolkit, OutputSink, OverlayStage};

/// Format templates for the output, in source order of the first clip
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPlan<F> {
    templates: Vec<TrackInfo<F>>,
}

impl<F: Clone> TrackPlan<F> {
    /// Keep the first video and first audio track; later duplicates and
    /// non-media tracks are ignored.
    pub fn from_tracks(tracks: &[TrackInfo<F>]) -> Self {
        let mut templates: Vec<TrackInfo<F>> = Vec::new();
        for track in tracks {
            if !track.kind.is_mergeable() {
                debug!(index = track.index, codec = %track.codec, "Skipping non-media track");
                continue;
            }
            if templates.iter().any(|t| t.kind == track.kind) {
                debug!(index = track.index, kind = %track.kind, "Ignoring extra track of planned kind");
                continue;
            }
            templates.push(track.clone());
        }
        Self { templates }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn template(&self, kind: MediaKind) -> Option<&TrackInfo<F>> {
        self.templates.iter().find(|t| t.kind == kind)
    }

    pub fn templates(&self) -> &[TrackInfo<F>] {
        &self.templates
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        self.templates.iter().map(|t| t.kind).collect()
    }
}

/// Mapping from media kind to output track, fixed once writing starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackLayout {
    slots: Vec<(MediaKind, usize)>,
}

impl TrackLayout {
    pub fn output_track(&self, kind: MediaKind) -> Option<usize> {
        self.slots
            .iter()
            .find(|(slot_kind, _)| *slot_kind == kind)
            .map(|(_, track)| *track)
    }

    /// Planned kinds in declaration order
    pub fn kinds(&self) -> impl Iterator<Item = MediaKind> + '_ {
        self.slots.iter().map(|(kind, _)| *kind)
    }
}

/// Inspect the first clip and derive the output plan. The clip handle is
/// closed before returning; sequencing opens it again like any other clip.
pub fn plan_output<T: MediaToolkit>(
    toolkit: &T,
    first_clip: &Path,
) -> Result<TrackPlan<T::Format>, MergeError> {
    let tracks = {
        let clip = toolkit
            .open_clip(first_clip)
            .map_err(|e| FailureReporter::unreadable(0, &e))?;
        clip.list_tracks()
    };

    let plan = TrackPlan::from_tracks(&tracks);
    if plan.is_empty() {
        return Err(FailureReporter::no_media_tracks(0));
    }

    info!(kinds = ?plan.kinds(), "Planned output tracks from clip 0");
    Ok(plan)
}

/// Declare the planned tracks on `output`. With an overlay, the video track
/// takes the overlay's output format instead of the source template.
pub fn declare<S, O>(
    plan: &TrackPlan<S::Format>,
    overlay: Option<&O>,
    output: &mut OutputContainer<S>,
) -> Result<TrackLayout, MergeError>
where
    S: OutputSink,
    S::Format: Clone,
    O: OverlayStage<Format = S::Format>,
{
    let mut layout = TrackLayout::default();
    for template in plan.templates() {
        let declared = match (template.kind, overlay) {
            (MediaKind::Video, Some(overlay)) => output.declare_track(&overlay.output_format()),
            _ => output.declare_track(template),
        }
        .map_err(|e| FailureReporter::write_failure("declare output track", &e))?;
        layout.slots.push((template.kind, declared));
    }
    Ok(layout)
}
