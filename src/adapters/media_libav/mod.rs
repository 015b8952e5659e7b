//! Media toolkit backed by libav through ffmpeg-next
//!
//! Clips are demuxed packet by packet and muxed into MP4 without touching the
//! compressed data. Only the overlay stage decodes and re-encodes video.

use std::fmt;
use std::path::{Path, PathBuf};

use ffmpeg_next::codec::{self, Parameters};
use ffmpeg_next::format::context::{Input, Output};
use ffmpeg_next::{format, media, packet, Dictionary, Packet, Rational, Rescale};
use tracing::{debug, info};

use crate::domain::model::*;
use crate::error::{MediaError, MediaResult};
use crate::ports::{ClipSource, MediaToolkit, OutputSink};

pub mod overlay;

pub use overlay::DrawTextOverlay;

/// Time base of every timestamp crossing the toolkit boundary
pub(crate) const MICROS: Rational = Rational(1, 1_000_000);

/// Stream parameters plus the timing needed to copy or re-encode a track
#[derive(Clone)]
pub struct LibavTrackFormat {
    pub(crate) parameters: Parameters,
    pub time_base: Rational,
    /// Average frame rate, video only
    pub frame_rate: Option<Rational>,
}

impl LibavTrackFormat {
    pub fn codec_id(&self) -> codec::Id {
        self.parameters.id()
    }
}

impl fmt::Debug for LibavTrackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibavTrackFormat")
            .field("codec", &self.codec_id())
            .field("time_base", &self.time_base)
            .field("frame_rate", &self.frame_rate)
            .finish()
    }
}

/// libav toolkit. Overlay encoding follows the configured encoder settings.
#[derive(Debug, Clone)]
pub struct LibavToolkit {
    encoder: EncoderSettings,
    font_file: Option<String>,
}

impl LibavToolkit {
    pub fn new(settings: &MergeSettings) -> MediaResult<Self> {
        ffmpeg_next::init()?;
        info!(
            encoder = %settings.encoder.video_encoder,
            preset = %settings.encoder.preset,
            crf = settings.encoder.crf,
            "libav toolkit initialized"
        );
        Ok(Self {
            encoder: settings.encoder.clone(),
            font_file: settings.watermark.font_file.clone(),
        })
    }
}

impl MediaToolkit for LibavToolkit {
    type Format = LibavTrackFormat;
    type Clip = LibavClip;
    type Output = LibavOutput;
    type Overlay = DrawTextOverlay;

    fn name(&self) -> &'static str {
        "libav"
    }

    fn open_clip(&self, path: &Path) -> MediaResult<LibavClip> {
        LibavClip::open(path)
    }

    fn create_output(&self, path: &Path, options: &OutputOptions) -> MediaResult<LibavOutput> {
        LibavOutput::create(path, options)
    }

    fn create_overlay(
        &self,
        descriptor: &OverlayDescriptor,
        video: &TrackInfo<LibavTrackFormat>,
    ) -> MediaResult<DrawTextOverlay> {
        DrawTextOverlay::new(descriptor, video, &self.encoder, self.font_file.as_deref())
    }
}

fn open_input(path: &Path) -> MediaResult<Input> {
    format::input(path).map_err(|e| MediaError::OpenFailed {
        message: format!("cannot open input: {}", e),
    })
}

fn track_kind(medium: media::Type) -> MediaKind {
    match medium {
        media::Type::Video => MediaKind::Video,
        media::Type::Audio => MediaKind::Audio,
        _ => MediaKind::Other,
    }
}

fn track_info(stream: &format::stream::Stream<'_>) -> TrackInfo<LibavTrackFormat> {
    let parameters = stream.parameters();
    let kind = track_kind(parameters.medium());
    let time_base = stream.time_base();

    let duration = stream.duration();
    let duration_us = (duration != ffmpeg_next::ffi::AV_NOPTS_VALUE && duration > 0)
        .then(|| duration.rescale(time_base, MICROS));

    let rate = stream.avg_frame_rate();
    let frame_rate = (kind == MediaKind::Video && rate.numerator() > 0 && rate.denominator() > 0)
        .then_some(rate);

    TrackInfo {
        index: stream.index(),
        kind,
        codec: format!("{}/{}", kind, parameters.id().name()),
        duration_us,
        format: LibavTrackFormat {
            parameters: parameters.clone(),
            time_base,
            frame_rate,
        },
    }
}

/// Open input file; the demuxer is closed on drop
pub struct LibavClip {
    path: PathBuf,
    input: Input,
    tracks: Vec<TrackInfo<LibavTrackFormat>>,
    selected: Option<usize>,
}

impl LibavClip {
    fn open(path: &Path) -> MediaResult<Self> {
        let input = open_input(path)?;
        let tracks: Vec<_> = input.streams().map(|s| track_info(&s)).collect();
        debug!(tracks = tracks.len(), format = input.format().name(), "Opened input");
        Ok(Self {
            path: path.to_path_buf(),
            input,
            tracks,
            selected: None,
        })
    }
}

impl ClipSource for LibavClip {
    type Format = LibavTrackFormat;

    fn list_tracks(&self) -> Vec<TrackInfo<LibavTrackFormat>> {
        self.tracks.clone()
    }

    fn select_track(&mut self, index: usize) -> MediaResult<()> {
        if index >= self.tracks.len() {
            return Err(MediaError::InvalidState {
                message: format!("no stream {} in input", index),
            });
        }
        self.selected = Some(index);
        Ok(())
    }

    fn seek_to_sync(&mut self, timestamp_us: i64) -> MediaResult<()> {
        match self.input.seek(timestamp_us, ..timestamp_us + 1) {
            Ok(()) => Ok(()),
            Err(e) if timestamp_us == 0 => {
                // Some demuxers refuse to seek; a fresh open is at the start anyway
                debug!(error = %e, "Seek to start failed, reopening input");
                self.input = open_input(&self.path)?;
                Ok(())
            }
            Err(e) => Err(MediaError::DemuxFailed {
                message: format!("seek to {}us: {}", timestamp_us, e),
            }),
        }
    }

    fn read_next_sample(&mut self) -> MediaResult<Option<Sample>> {
        let selected = self.selected.ok_or_else(|| MediaError::InvalidState {
            message: "no track selected".to_string(),
        })?;
        let time_base = self.tracks[selected].format.time_base;

        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => {
                    return Err(MediaError::DemuxFailed {
                        message: format!("read packet: {}", e),
                    })
                }
            }
            if packet.stream() != selected {
                continue;
            }
            let Some(pts) = packet.pts().or(packet.dts()) else {
                debug!(stream = selected, "Skipping packet without timestamps");
                continue;
            };

            let mut sample = Sample::new(
                pts.rescale(time_base, MICROS),
                packet.duration().rescale(time_base, MICROS),
                packet.is_key(),
                packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
            );
            sample.dts_us = packet.dts().map(|dts| dts.rescale(time_base, MICROS));
            return Ok(Some(sample));
        }
    }
}

/// MP4 muxer writing straight to the staging path
pub struct LibavOutput {
    output: Output,
    options: OutputOptions,
    time_bases: Vec<Rational>,
    last_dts: Vec<Option<i64>>,
    started: bool,
}

impl LibavOutput {
    fn create(path: &Path, options: &OutputOptions) -> MediaResult<Self> {
        let output = format::output_as(path, "mp4").map_err(|e| MediaError::OpenFailed {
            message: format!("cannot create mp4 output: {}", e),
        })?;
        Ok(Self {
            output,
            options: options.clone(),
            time_bases: Vec::new(),
            last_dts: Vec::new(),
            started: false,
        })
    }
}

fn mux_error(action: &str, e: ffmpeg_next::Error) -> MediaError {
    MediaError::MuxFailed {
        message: format!("{}: {}", action, e),
    }
}

impl OutputSink for LibavOutput {
    type Format = LibavTrackFormat;

    fn declare_track(&mut self, track: &TrackInfo<LibavTrackFormat>) -> MediaResult<usize> {
        if self.started {
            return Err(MediaError::InvalidState {
                message: "tracks must be declared before the header is written".to_string(),
            });
        }

        let mut stream = self
            .output
            .add_stream(codec::encoder::find(codec::Id::None))
            .map_err(|e| mux_error("add stream", e))?;
        stream.set_parameters(track.format.parameters.clone());
        // Let the mp4 muxer pick its own tag for the codec
        unsafe {
            (*stream.parameters().as_mut_ptr()).codec_tag = 0;
        }
        stream.set_time_base(track.format.time_base);

        if track.kind == MediaKind::Video {
            if let Some(degrees) = self.options.orientation_hint {
                let mut metadata = Dictionary::new();
                metadata.set("rotate", &degrees.to_string());
                stream.set_metadata(metadata);
            }
        }

        let index = stream.index();
        self.time_bases.push(track.format.time_base);
        self.last_dts.push(None);
        debug!(index, kind = %track.kind, codec = %track.codec, "Declared output stream");
        Ok(index)
    }

    fn start(&mut self) -> MediaResult<()> {
        if self.time_bases.is_empty() {
            return Err(MediaError::InvalidState {
                message: "no output streams declared".to_string(),
            });
        }

        let mut options = Dictionary::new();
        if self.options.faststart {
            options.set("movflags", "+faststart");
        }
        self.output
            .write_header_with(options)
            .map_err(|e| mux_error("write header", e))?;

        // The muxer may have replaced the requested time bases
        for (index, time_base) in self.time_bases.iter_mut().enumerate() {
            if let Some(stream) = self.output.stream(index) {
                *time_base = stream.time_base();
            }
        }
        self.started = true;
        Ok(())
    }

    fn write_sample(&mut self, track: usize, sample: &Sample) -> MediaResult<()> {
        if !self.started {
            return Err(MediaError::InvalidState {
                message: "header not written".to_string(),
            });
        }
        let time_base = *self.time_bases.get(track).ok_or_else(|| MediaError::InvalidState {
            message: format!("no output stream {}", track),
        })?;

        let mut dts = sample.decode_time_us().rescale(MICROS, time_base);
        if let Some(last) = self.last_dts[track] {
            if dts <= last {
                dts = last + 1;
            }
        }
        let pts = sample.pts_us.rescale(MICROS, time_base).max(dts);
        self.last_dts[track] = Some(dts);

        let mut packet = Packet::copy(&sample.data);
        packet.set_stream(track);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(dts));
        packet.set_duration(sample.duration_us.rescale(MICROS, time_base));
        if sample.flags.key_frame {
            packet.set_flags(packet::Flags::KEY);
        }
        packet.set_position(-1);
        packet
            .write_interleaved(&mut self.output)
            .map_err(|e| mux_error("write packet", e))
    }

    fn finalize(mut self) -> MediaResult<()> {
        if !self.started {
            return Err(MediaError::InvalidState {
                message: "cannot finalize before the header is written".to_string(),
            });
        }
        self.output
            .write_trailer()
            .map_err(|e| mux_error("write trailer", e))
    }
}
