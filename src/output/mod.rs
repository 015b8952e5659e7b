//! Output container lifecycle and verification
//!
//! `OutputContainer` owns the file under construction. Samples go to a
//! staging file next to the target; only `finalize` renames it into place, so
//! the target path never holds a truncated merge. Dropping or aborting the
//! container closes the sink, removes the staging file and any directories
//! that were created for it.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::domain::model::{MediaKind, OutputOptions, Sample, TrackInfo, TrackSummary};
use crate::error::{MediaError, MediaResult};
use crate::ports::{MediaToolkit, OutputSink};

pub mod verifier;

/// Where `path` really points, whether or not it exists yet. The deepest
/// existing ancestor is canonicalized and the remainder is folded lexically.
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    let (mut resolved, rest) = path
        .ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .find_map(|ancestor| {
            let real = fs::canonicalize(ancestor).ok()?;
            Some((real, path.strip_prefix(ancestor).ok()?))
        })
        .unwrap_or_else(|| (std::env::current_dir().unwrap_or_default(), path));

    for component in rest.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// Index of the first clip that is the same file as `output`
pub fn aliased_clip(clips: &[PathBuf], output: &Path) -> Option<usize> {
    let output = resolve_path(output);
    clips.iter().position(|clip| resolve_path(clip) == output)
}

/// Ancestors of `dir` that do not exist yet, deepest first
fn missing_dirs(dir: &Path) -> Vec<PathBuf> {
    dir.ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .take_while(|ancestor| !ancestor.exists())
        .map(Path::to_path_buf)
        .collect()
}

/// Lifecycle: Declaring -> Writing -> Finalized, or Aborted from any state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Declaring,
    Writing,
    Finalized,
    Aborted,
}

/// Per-output-track bookkeeping
#[derive(Debug)]
struct TrackCursor {
    kind: MediaKind,
    sink_index: usize,
    last_decode_us: Option<i64>,
    samples: u64,
    adjusted: u64,
    end_us: i64,
}

impl TrackCursor {
    fn new(kind: MediaKind, sink_index: usize) -> Self {
        Self {
            kind,
            sink_index,
            last_decode_us: None,
            samples: 0,
            adjusted: 0,
            end_us: 0,
        }
    }

    /// Keep decode timestamps non-decreasing. A sample that would step back
    /// is shifted forward to the previous decode time.
    fn admit(&mut self, sample: Sample) -> Sample {
        let decode_us = sample.decode_time_us();
        let sample = match self.last_decode_us {
            Some(last) if decode_us < last => {
                self.adjusted += 1;
                debug!(
                    kind = %self.kind,
                    from_us = decode_us,
                    to_us = last,
                    "Clamping overlapping sample"
                );
                sample.rebased(last - decode_us)
            }
            _ => sample,
        };
        self.last_decode_us = Some(sample.decode_time_us());
        self.samples += 1;
        self.end_us = self.end_us.max(sample.end_us());
        sample
    }

    fn summary(&self) -> TrackSummary {
        TrackSummary {
            kind: self.kind,
            samples: self.samples,
            adjusted: self.adjusted,
            end_us: self.end_us,
        }
    }
}

pub struct OutputContainer<S: OutputSink> {
    target: PathBuf,
    /// Directories created for the target, deepest first
    created_dirs: Vec<PathBuf>,
    staging: Option<TempPath>,
    sink: Option<S>,
    state: ContainerState,
    tracks: Vec<TrackCursor>,
}

impl<S: OutputSink> OutputContainer<S> {
    /// Open a staging file beside `target` and hand it to the toolkit
    pub fn create<T>(toolkit: &T, target: &Path, options: &OutputOptions) -> MediaResult<Self>
    where
        T: MediaToolkit<Output = S>,
    {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let created_dirs = missing_dirs(&parent);
        fs::create_dir_all(&parent)?;

        let staging = match tempfile::Builder::new()
            .prefix(".reelmerge-")
            .suffix(".mp4")
            .tempfile_in(&parent)
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                remove_created_dirs(&created_dirs);
                return Err(e.into());
            }
        };
        debug!(staging = %staging.display(), toolkit = toolkit.name(), "Staging output");

        let sink = toolkit.create_output(&staging, options);
        let mut container = Self {
            target: target.to_path_buf(),
            created_dirs,
            staging: Some(staging),
            sink: None,
            state: ContainerState::Declaring,
            tracks: Vec::new(),
        };
        // Dropping the container on error cleans up the staging file
        container.sink = Some(sink?);
        Ok(container)
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn staging_path(&self) -> Option<&Path> {
        self.staging.as_deref()
    }

    /// Declare one output track; only allowed before `start`
    pub fn declare_track(&mut self, track: &TrackInfo<S::Format>) -> MediaResult<usize> {
        self.expect_state(ContainerState::Declaring, "declare a track")?;
        let sink_index = self.sink_mut()?.declare_track(track)?;
        self.tracks.push(TrackCursor::new(track.kind, sink_index));
        debug!(kind = %track.kind, codec = %track.codec, "Declared output track");
        Ok(self.tracks.len() - 1)
    }

    /// Close the track set and write the container header
    pub fn start(&mut self) -> MediaResult<()> {
        self.expect_state(ContainerState::Declaring, "start writing")?;
        if self.tracks.is_empty() {
            return Err(MediaError::InvalidState {
                message: "no output tracks declared".to_string(),
            });
        }
        self.sink_mut()?.start()?;
        self.state = ContainerState::Writing;
        Ok(())
    }

    pub fn write_sample(&mut self, track: usize, sample: Sample) -> MediaResult<()> {
        self.expect_state(ContainerState::Writing, "write a sample")?;
        let cursor = self
            .tracks
            .get_mut(track)
            .ok_or_else(|| MediaError::InvalidState {
                message: format!("output track {} was not declared", track),
            })?;
        let sample = cursor.admit(sample);
        let sink_index = cursor.sink_index;
        self.sink_mut()?.write_sample(sink_index, &sample)
    }

    pub fn summaries(&self) -> Vec<TrackSummary> {
        self.tracks.iter().map(TrackCursor::summary).collect()
    }

    /// Flush the container and move it to the target path
    pub fn finalize(mut self) -> MediaResult<Vec<TrackSummary>> {
        self.expect_state(ContainerState::Writing, "finalize")?;
        let sink = self.sink.take().ok_or_else(|| MediaError::InvalidState {
            message: "output sink already released".to_string(),
        })?;
        sink.finalize()?;

        let staging = self.staging.take().ok_or_else(|| MediaError::InvalidState {
            message: "staging file already released".to_string(),
        })?;
        staging
            .persist(&self.target)
            .map_err(|e| MediaError::IoError(e.error))?;
        self.state = ContainerState::Finalized;

        let summaries = self.summaries();
        for track in summaries.iter().filter(|t| t.adjusted > 0) {
            warn!(
                kind = %track.kind,
                adjusted = track.adjusted,
                "Samples overlapped the previous clip and were clamped"
            );
        }
        info!(output = %self.target.display(), tracks = summaries.len(), "Output finalized");
        Ok(summaries)
    }

    /// Discard everything written so far
    pub fn abort(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if matches!(self.state, ContainerState::Finalized | ContainerState::Aborted) {
            return;
        }
        // Close the sink before its file goes away.
        drop(self.sink.take());
        if let Some(staging) = self.staging.take() {
            if let Err(e) = staging.close() {
                warn!(error = %e, "Failed to remove staging file");
            }
        }
        remove_created_dirs(&self.created_dirs);
        self.state = ContainerState::Aborted;
        debug!("Output discarded");
    }

    fn sink_mut(&mut self) -> MediaResult<&mut S> {
        self.sink.as_mut().ok_or_else(|| MediaError::InvalidState {
            message: "output sink already released".to_string(),
        })
    }

    fn expect_state(&self, expected: ContainerState, action: &str) -> MediaResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(MediaError::InvalidState {
                message: format!("cannot {} while output is {:?}", action, self.state),
            })
        }
    }
}

/// Remove directories made for an output that never materialized. Only
/// empty directories go; anything written there since is left alone.
fn remove_created_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        if let Err(e) = fs::remove_dir(dir) {
            debug!(dir = %dir.display(), error = %e, "Keeping output directory");
            break;
        }
    }
}

impl<S: OutputSink> Drop for OutputContainer<S> {
    fn drop(&mut self) {
        self.discard();
    }
}
