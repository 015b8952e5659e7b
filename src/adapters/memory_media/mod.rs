//! In-memory media toolkit
//!
//! Clips are registered up front or read from JSON files on disk; outputs are
//! written as JSON at finalize so a merged file can be re-opened like any
//! other clip. Used by the test suites to exercise the pipeline without FFmpeg.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::model::*;
use crate::error::{MediaError, MediaResult};
use crate::ports::{ClipSource, MediaToolkit, OutputSink, OverlayStage};

/// Format descriptor of an in-memory track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFormat {
    pub width: u32,
    pub height: u32,
    pub sample_rate: u32,
    /// Overlay text burnt into the track, if any
    pub overlay: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTrack {
    pub kind: MediaKind,
    pub codec: String,
    pub duration_us: Option<i64>,
    pub format: MemoryFormat,
    pub samples: Vec<Sample>,
}

impl MemoryTrack {
    /// 320x240 H.264-like track with a key frame every `gop` frames
    pub fn video(duration_us: i64, frame_us: i64, gop: usize) -> Self {
        let samples = timestamps(duration_us, frame_us)
            .enumerate()
            .map(|(n, pts)| {
                let key = n % gop.max(1) == 0;
                let duration = frame_us.min(duration_us - pts);
                Sample::new(pts, duration, key, format!("frame-{}", n).into_bytes())
            })
            .collect();
        Self {
            kind: MediaKind::Video,
            codec: "video/h264".to_string(),
            duration_us: Some(duration_us),
            format: MemoryFormat {
                width: 320,
                height: 240,
                ..MemoryFormat::default()
            },
            samples,
        }
    }

    /// AAC-like track where every chunk is a sync sample
    pub fn audio(duration_us: i64, chunk_us: i64) -> Self {
        let samples = timestamps(duration_us, chunk_us)
            .enumerate()
            .map(|(n, pts)| {
                let duration = chunk_us.min(duration_us - pts);
                Sample::new(pts, duration, true, format!("chunk-{}", n).into_bytes())
            })
            .collect();
        Self {
            kind: MediaKind::Audio,
            codec: "audio/aac".to_string(),
            duration_us: Some(duration_us),
            format: MemoryFormat {
                sample_rate: 48_000,
                ..MemoryFormat::default()
            },
            samples,
        }
    }

    pub fn subtitles() -> Self {
        Self {
            kind: MediaKind::Other,
            codec: "text/mov_text".to_string(),
            duration_us: None,
            format: MemoryFormat::default(),
            samples: vec![Sample::new(0, 1_000_000, true, b"hello".to_vec())],
        }
    }

    /// Drop the container-level duration, as some muxers do
    pub fn without_duration(mut self) -> Self {
        self.duration_us = None;
        self
    }
}

fn timestamps(duration_us: i64, step_us: i64) -> impl Iterator<Item = i64> {
    (0..duration_us.max(0)).step_by(step_us.max(1) as usize)
}

/// A clip or merged output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryContainer {
    pub tracks: Vec<MemoryTrack>,
    #[serde(default)]
    pub orientation_hint: Option<u32>,
}

impl MemoryContainer {
    pub fn new(tracks: Vec<MemoryTrack>) -> Self {
        Self {
            tracks,
            orientation_hint: None,
        }
    }

    /// Video + audio clip of the given length at 30 fps / ~21 ms audio chunks
    pub fn clip(duration_us: i64) -> Self {
        Self::new(vec![
            MemoryTrack::video(duration_us, 33_333, 30),
            MemoryTrack::audio(duration_us, 21_333),
        ])
    }

    pub fn load(path: &Path) -> MediaResult<Self> {
        let content = fs::read(path)?;
        serde_json::from_slice(&content).map_err(|e| MediaError::DemuxFailed {
            message: format!("not a memory container: {}", e),
        })
    }

    pub fn save(&self, path: &Path) -> MediaResult<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn track(&self, kind: MediaKind) -> Option<&MemoryTrack> {
        self.tracks.iter().find(|track| track.kind == kind)
    }
}

/// In-memory toolkit
#[derive(Debug, Default)]
pub struct MemoryToolkit {
    clips: RwLock<HashMap<PathBuf, MemoryContainer>>,
    open_handles: Arc<AtomicUsize>,
    opened_total: AtomicUsize,
    write_limit: Option<usize>,
}

impl MemoryToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outputs fail with a mux error once `limit` samples have been written
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn register(&self, path: impl Into<PathBuf>, container: MemoryContainer) {
        if let Ok(mut clips) = self.clips.write() {
            clips.insert(path.into(), container);
        }
    }

    /// Clip handles currently open
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Clip handles opened since creation
    pub fn opened_total(&self) -> usize {
        self.opened_total.load(Ordering::SeqCst)
    }

    fn lookup(&self, path: &Path) -> MediaResult<MemoryContainer> {
        let registered = self
            .clips
            .read()
            .map_err(|_| MediaError::InvalidState {
                message: "clip registry poisoned".to_string(),
            })?
            .get(path)
            .cloned();
        match registered {
            Some(container) => Ok(container),
            None if path.is_file() => MemoryContainer::load(path),
            None => Err(MediaError::OpenFailed {
                message: format!("no such clip: {}", path.display()),
            }),
        }
    }
}

impl MediaToolkit for MemoryToolkit {
    type Format = MemoryFormat;
    type Clip = MemoryClip;
    type Output = MemoryOutput;
    type Overlay = MemoryOverlay;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn open_clip(&self, path: &Path) -> MediaResult<MemoryClip> {
        let container = self.lookup(path)?;
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryClip {
            container,
            selected: None,
            cursor: 0,
            open_handles: Arc::clone(&self.open_handles),
        })
    }

    fn create_output(&self, path: &Path, options: &OutputOptions) -> MediaResult<MemoryOutput> {
        Ok(MemoryOutput {
            path: path.to_path_buf(),
            options: options.clone(),
            container: MemoryContainer::default(),
            started: false,
            written: 0,
            write_limit: self.write_limit,
        })
    }

    fn create_overlay(
        &self,
        descriptor: &OverlayDescriptor,
        video: &TrackInfo<MemoryFormat>,
    ) -> MediaResult<MemoryOverlay> {
        let mut output = video.clone();
        output.format.overlay = Some(descriptor.text.clone());
        output.duration_us = None;
        Ok(MemoryOverlay {
            stamp: overlay_stamp(&descriptor.text),
            output,
            pending: None,
        })
    }
}

/// Payload prefix added by `MemoryOverlay`
pub fn overlay_stamp(text: &str) -> Vec<u8> {
    format!("[overlay:{}]", text).into_bytes()
}

pub struct MemoryClip {
    container: MemoryContainer,
    selected: Option<usize>,
    cursor: usize,
    open_handles: Arc<AtomicUsize>,
}

impl MemoryClip {
    fn selected_track(&self) -> MediaResult<&MemoryTrack> {
        self.selected
            .and_then(|index| self.container.tracks.get(index))
            .ok_or_else(|| MediaError::InvalidState {
                message: "no track selected".to_string(),
            })
    }
}

impl ClipSource for MemoryClip {
    type Format = MemoryFormat;

    fn list_tracks(&self) -> Vec<TrackInfo<MemoryFormat>> {
        self.container
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| TrackInfo {
                index,
                kind: track.kind,
                codec: track.codec.clone(),
                duration_us: track.duration_us,
                format: track.format.clone(),
            })
            .collect()
    }

    fn select_track(&mut self, index: usize) -> MediaResult<()> {
        if index >= self.container.tracks.len() {
            return Err(MediaError::DemuxFailed {
                message: format!("track {} does not exist", index),
            });
        }
        self.selected = Some(index);
        self.cursor = 0;
        Ok(())
    }

    fn seek_to_sync(&mut self, timestamp_us: i64) -> MediaResult<()> {
        let track = self.selected_track()?;
        self.cursor = track
            .samples
            .iter()
            .rposition(|s| s.flags.key_frame && s.pts_us <= timestamp_us)
            .unwrap_or(0);
        Ok(())
    }

    fn read_next_sample(&mut self) -> MediaResult<Option<Sample>> {
        let sample = self.selected_track()?.samples.get(self.cursor).cloned();
        if sample.is_some() {
            self.cursor += 1;
        }
        Ok(sample)
    }
}

impl Drop for MemoryClip {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MemoryOutput {
    path: PathBuf,
    options: OutputOptions,
    container: MemoryContainer,
    started: bool,
    written: usize,
    write_limit: Option<usize>,
}

impl OutputSink for MemoryOutput {
    type Format = MemoryFormat;

    fn declare_track(&mut self, track: &TrackInfo<MemoryFormat>) -> MediaResult<usize> {
        if self.started {
            return Err(MediaError::MuxFailed {
                message: "track declared after start".to_string(),
            });
        }
        self.container.tracks.push(MemoryTrack {
            kind: track.kind,
            codec: track.codec.clone(),
            duration_us: None,
            format: track.format.clone(),
            samples: Vec::new(),
        });
        Ok(self.container.tracks.len() - 1)
    }

    fn start(&mut self) -> MediaResult<()> {
        self.started = true;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, sample: &Sample) -> MediaResult<()> {
        if !self.started {
            return Err(MediaError::MuxFailed {
                message: "sample written before start".to_string(),
            });
        }
        if self.write_limit.is_some_and(|limit| self.written >= limit) {
            return Err(MediaError::MuxFailed {
                message: "write limit reached".to_string(),
            });
        }
        let target = self
            .container
            .tracks
            .get_mut(track)
            .ok_or_else(|| MediaError::MuxFailed {
                message: format!("track {} was not declared", track),
            })?;
        target.samples.push(sample.clone());
        self.written += 1;
        Ok(())
    }

    fn finalize(mut self) -> MediaResult<()> {
        self.container.orientation_hint = self.options.orientation_hint;
        for track in &mut self.container.tracks {
            track.duration_us = track.samples.iter().map(Sample::end_us).max();
        }
        debug!(path = %self.path.display(), tracks = self.container.tracks.len(), "Memory output finalized");
        self.container.save(&self.path)
    }
}

/// Stamps every video sample with the overlay text, holding one sample back
/// per clip so buffering encoders are modelled.
pub struct MemoryOverlay {
    stamp: Vec<u8>,
    output: TrackInfo<MemoryFormat>,
    pending: Option<Sample>,
}

impl OverlayStage for MemoryOverlay {
    type Format = MemoryFormat;

    fn output_format(&self) -> TrackInfo<MemoryFormat> {
        self.output.clone()
    }

    fn begin_clip(&mut self, _source: &TrackInfo<MemoryFormat>) -> MediaResult<()> {
        if self.pending.is_some() {
            return Err(MediaError::InvalidState {
                message: "previous clip was not finished".to_string(),
            });
        }
        Ok(())
    }

    fn compose(&mut self, mut sample: Sample) -> MediaResult<Vec<Sample>> {
        let mut data = self.stamp.clone();
        data.extend_from_slice(&sample.data);
        sample.data = data;
        Ok(self.pending.replace(sample).into_iter().collect())
    }

    fn finish_clip(&mut self) -> MediaResult<Vec<Sample>> {
        Ok(self.pending.take().into_iter().collect())
    }
}
