//! Output verification implementation

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::model::{MediaKind, TrackDescription};
use crate::error::MediaResult;
use crate::ports::{ClipSource, MediaToolkit};

/// Sample-level statistics of one track of a merged file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackReport {
    pub track: TrackDescription,
    pub samples: u64,
    pub key_frames: u64,
    pub first_pts_us: Option<i64>,
    pub end_us: i64,
    /// Decode timestamps never step backwards
    pub monotonic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub path: String,
    pub tracks: Vec<TrackReport>,
}

impl VerificationReport {
    pub fn is_monotonic(&self) -> bool {
        self.tracks.iter().all(|t| t.monotonic)
    }

    pub fn track(&self, kind: MediaKind) -> Option<&TrackReport> {
        self.tracks.iter().find(|t| t.track.kind == kind)
    }

    /// Span of the first track of `kind`
    pub fn duration_us(&self, kind: MediaKind) -> Option<i64> {
        self.track(kind)
            .map(|t| t.end_us - t.first_pts_us.unwrap_or(0))
    }
}

/// Re-open `path` with `toolkit` and walk every audio and video sample
pub fn verify_output<T: MediaToolkit>(toolkit: &T, path: &Path) -> MediaResult<VerificationReport> {
    info!("Verifying merged output: {}", path.display());

    let mut clip = toolkit.open_clip(path)?;
    let mut tracks = Vec::new();

    for track in clip.list_tracks() {
        if !track.kind.is_mergeable() {
            continue;
        }
        clip.select_track(track.index)?;
        clip.seek_to_sync(0)?;

        let mut report = TrackReport {
            track: track.describe(),
            samples: 0,
            key_frames: 0,
            first_pts_us: None,
            end_us: 0,
            monotonic: true,
        };
        let mut last_decode = None;

        while let Some(sample) = clip.read_next_sample()? {
            let decode = sample.decode_time_us();
            if last_decode.is_some_and(|last| decode < last) {
                report.monotonic = false;
            }
            last_decode = Some(decode);

            report.samples += 1;
            if sample.flags.key_frame {
                report.key_frames += 1;
            }
            let first = report.first_pts_us.map_or(sample.pts_us, |p| p.min(sample.pts_us));
            report.first_pts_us = Some(first);
            report.end_us = report.end_us.max(sample.end_us());
        }

        if !report.monotonic {
            warn!(kind = %track.kind, index = track.index, "Track timestamps step backwards");
        }
        tracks.push(report);
    }

    Ok(VerificationReport {
        path: path.display().to_string(),
        tracks,
    })
}
