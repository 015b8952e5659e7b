//! drawtext overlay stage
//!
//! Video samples are decoded, pushed through `scale,drawtext,format` and
//! encoded again. Every clip gets its own decoder, filter graph and encoder
//! so one clip can be drained completely before the next begins. All encoders
//! share the same settings, so the stream parameters taken from the template
//! encoder describe every clip's output.

use ffmpeg_next::codec::{self, Parameters};
use ffmpeg_next::{
    decoder, encoder, filter, format, frame, packet, picture, Dictionary, Packet, Rational,
    Rescale,
};
use tracing::{debug, warn};

use super::{LibavTrackFormat, MICROS};
use crate::domain::model::{EncoderSettings, MediaKind, OverlayDescriptor, Sample, TrackInfo};
use crate::error::{MediaError, MediaResult};
use crate::ports::OverlayStage;

/// Frame size and timing every clip is normalized to
#[derive(Debug, Clone, Copy)]
struct FrameTarget {
    width: u32,
    height: u32,
    time_base: Rational,
    frame_rate: Rational,
}

/// Escape a value for use inside a filter option (`key=value`)
pub fn escape_filter_option(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape an already option-escaped value for use inside a filter graph
pub fn escape_filter_graph(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn graph_value(value: &str) -> String {
    escape_filter_graph(&escape_filter_option(value))
}

/// Filter chain scaling to `width`x`height` and drawing `descriptor` on top
pub fn drawtext_filter(
    descriptor: &OverlayDescriptor,
    width: u32,
    height: u32,
    font_file: Option<&str>,
) -> String {
    let mut drawtext = format!(
        "drawtext=text={}:expansion=none:fontsize={}:fontcolor={}@{:.3}:x=(w-text_w)*{:.4}:y=(h-text_h)*{:.4}",
        graph_value(&descriptor.text),
        descriptor.font_size_px(height),
        descriptor.color.to_hex(),
        descriptor.alpha(),
        descriptor.horizontal_fraction(),
        descriptor.vertical_fraction(),
    );
    if let Some(font) = font_file {
        drawtext.push_str(":fontfile=");
        drawtext.push_str(&graph_value(font));
    }
    format!("scale={}:{},{},format=yuv420p", width, height, drawtext)
}

fn codec_error(action: &str, e: ffmpeg_next::Error) -> MediaError {
    MediaError::CodecFailed {
        message: format!("{}: {}", action, e),
    }
}

fn filter_error(action: &str, e: ffmpeg_next::Error) -> MediaError {
    MediaError::FilterFailed {
        message: format!("{}: {}", action, e),
    }
}

/// `Ok(true)` once the codec needs more input or has been fully drained
fn drained(
    result: Result<(), ffmpeg_next::Error>,
    action: &str,
    wrap: fn(&str, ffmpeg_next::Error) -> MediaError,
) -> MediaResult<bool> {
    match result {
        Ok(()) => Ok(false),
        Err(ffmpeg_next::Error::Eof) => Ok(true),
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EAGAIN => {
            Ok(true)
        }
        Err(e) => Err(wrap(action, e)),
    }
}

fn open_decoder(format: &LibavTrackFormat) -> MediaResult<decoder::Video> {
    codec::context::Context::from_parameters(format.parameters.clone())
        .and_then(|context| context.decoder().video())
        .map_err(|e| codec_error("open video decoder", e))
}

fn open_encoder(settings: &EncoderSettings, target: &FrameTarget) -> MediaResult<encoder::Video> {
    let codec = encoder::find_by_name(&settings.video_encoder)
        .or_else(|| {
            warn!(encoder = %settings.video_encoder, "Encoder not available, using default H.264");
            encoder::find(codec::Id::H264)
        })
        .ok_or_else(|| MediaError::CodecFailed {
            message: "no H.264 encoder available".to_string(),
        })?;

    let mut video = codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .map_err(|e| codec_error("create video encoder", e))?;
    video.set_width(target.width);
    video.set_height(target.height);
    video.set_format(format::Pixel::YUV420P);
    video.set_time_base(target.time_base);
    video.set_frame_rate(Some(target.frame_rate));
    // Output decode order must match presentation order
    video.set_max_b_frames(0);
    video.set_flags(codec::Flags::GLOBAL_HEADER);

    let mut options = Dictionary::new();
    options.set("preset", &settings.preset);
    options.set("crf", &settings.crf.to_string());
    options.set("threads", &settings.thread_count().to_string());
    video
        .open_with(options)
        .map_err(|e| codec_error("open video encoder", e))
}

fn build_graph(
    decoder: &decoder::Video,
    time_base: Rational,
    filters: &str,
) -> MediaResult<filter::Graph> {
    let aspect = decoder.aspect_ratio();
    let aspect = if aspect.numerator() == 0 {
        Rational(1, 1)
    } else {
        aspect
    };
    let args = format!(
        "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
        decoder.width(),
        decoder.height(),
        ffmpeg_next::ffi::AVPixelFormat::from(decoder.format()) as i32,
        time_base.numerator(),
        time_base.denominator(),
        aspect.numerator(),
        aspect.denominator(),
    );

    let buffer = filter::find("buffer").ok_or_else(|| MediaError::FilterFailed {
        message: "buffer filter not available".to_string(),
    })?;
    let buffersink = filter::find("buffersink").ok_or_else(|| MediaError::FilterFailed {
        message: "buffersink filter not available".to_string(),
    })?;

    let mut graph = filter::Graph::new();
    graph
        .add(&buffer, "in", &args)
        .map_err(|e| filter_error("add source", e))?;
    graph
        .add(&buffersink, "out", "")
        .map_err(|e| filter_error("add sink", e))?;
    graph
        .output("in", 0)
        .and_then(|parser| parser.input("out", 0))
        .and_then(|parser| parser.parse(filters))
        .map_err(|e| filter_error("parse overlay graph", e))?;
    graph
        .validate()
        .map_err(|e| filter_error("configure overlay graph", e))?;
    Ok(graph)
}

fn packet_to_sample(packet: &Packet, time_base: Rational) -> Sample {
    let pts = packet.pts().or(packet.dts()).unwrap_or(0);
    let mut sample = Sample::new(
        pts.rescale(time_base, MICROS),
        packet.duration().rescale(time_base, MICROS),
        packet.is_key(),
        packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
    );
    sample.dts_us = packet.dts().map(|dts| dts.rescale(time_base, MICROS));
    sample
}

/// Decode, filter and encode state for one clip
struct ClipComposer {
    decoder: decoder::Video,
    graph: filter::Graph,
    encoder: encoder::Video,
    source_time_base: Rational,
    encoder_time_base: Rational,
}

impl ClipComposer {
    fn new(
        source: &TrackInfo<LibavTrackFormat>,
        filters: &str,
        settings: &EncoderSettings,
        target: &FrameTarget,
    ) -> MediaResult<Self> {
        let decoder = open_decoder(&source.format)?;
        let graph = build_graph(&decoder, source.format.time_base, filters)?;
        let encoder = open_encoder(settings, target)?;
        Ok(Self {
            decoder,
            graph,
            encoder,
            source_time_base: source.format.time_base,
            encoder_time_base: target.time_base,
        })
    }

    fn push(&mut self, sample: Sample) -> MediaResult<Vec<Sample>> {
        let mut packet = Packet::copy(&sample.data);
        packet.set_pts(Some(sample.pts_us.rescale(MICROS, self.source_time_base)));
        packet.set_dts(
            sample
                .dts_us
                .map(|dts| dts.rescale(MICROS, self.source_time_base)),
        );
        packet.set_duration(sample.duration_us.rescale(MICROS, self.source_time_base));
        if sample.flags.key_frame {
            packet.set_flags(packet::Flags::KEY);
        }
        self.decoder
            .send_packet(&packet)
            .map_err(|e| codec_error("decode sample", e))?;

        let mut composed = Vec::new();
        self.drain_decoder(&mut composed)?;
        Ok(composed)
    }

    fn finish(mut self) -> MediaResult<Vec<Sample>> {
        let mut composed = Vec::new();
        self.decoder
            .send_eof()
            .map_err(|e| codec_error("flush decoder", e))?;
        self.drain_decoder(&mut composed)?;

        self.graph
            .get("in")
            .ok_or_else(|| missing_pad("in"))?
            .source()
            .flush()
            .map_err(|e| filter_error("flush overlay graph", e))?;
        self.drain_graph(&mut composed)?;

        self.encoder
            .send_eof()
            .map_err(|e| codec_error("flush encoder", e))?;
        self.drain_encoder(&mut composed)?;
        Ok(composed)
    }

    fn drain_decoder(&mut self, composed: &mut Vec<Sample>) -> MediaResult<()> {
        let mut decoded = frame::Video::empty();
        while !drained(
            self.decoder.receive_frame(&mut decoded),
            "decode frame",
            codec_error,
        )? {
            let timestamp = decoded.timestamp();
            decoded.set_pts(timestamp);
            self.graph
                .get("in")
                .ok_or_else(|| missing_pad("in"))?
                .source()
                .add(&decoded)
                .map_err(|e| filter_error("feed overlay graph", e))?;
            self.drain_graph(composed)?;
        }
        Ok(())
    }

    fn drain_graph(&mut self, composed: &mut Vec<Sample>) -> MediaResult<()> {
        let mut filtered = frame::Video::empty();
        loop {
            let result = self
                .graph
                .get("out")
                .ok_or_else(|| missing_pad("out"))?
                .sink()
                .frame(&mut filtered);
            if drained(result, "draw overlay", filter_error)? {
                return Ok(());
            }

            let pts = filtered
                .pts()
                .map(|pts| pts.rescale(self.source_time_base, self.encoder_time_base));
            filtered.set_pts(pts);
            filtered.set_kind(picture::Type::None);
            self.encoder
                .send_frame(&filtered)
                .map_err(|e| codec_error("encode frame", e))?;
            self.drain_encoder(composed)?;
        }
    }

    fn drain_encoder(&mut self, composed: &mut Vec<Sample>) -> MediaResult<()> {
        let mut encoded = Packet::empty();
        while !drained(
            self.encoder.receive_packet(&mut encoded),
            "encode frame",
            codec_error,
        )? {
            composed.push(packet_to_sample(&encoded, self.encoder_time_base));
        }
        Ok(())
    }
}

fn missing_pad(name: &str) -> MediaError {
    MediaError::FilterFailed {
        message: format!("overlay graph has no '{}' pad", name),
    }
}

/// Overlay stage burning static text into the merged video track
pub struct DrawTextOverlay {
    filters: String,
    settings: EncoderSettings,
    target: FrameTarget,
    output: TrackInfo<LibavTrackFormat>,
    composer: Option<ClipComposer>,
}

impl DrawTextOverlay {
    /// Prepare the overlay for a merge whose first video track is `template`.
    /// The filter graph and encoder are built once here so an unusable font or
    /// encoder fails before any output is written.
    pub fn new(
        descriptor: &OverlayDescriptor,
        template: &TrackInfo<LibavTrackFormat>,
        settings: &EncoderSettings,
        font_file: Option<&str>,
    ) -> MediaResult<Self> {
        let probe = open_decoder(&template.format)?;
        if probe.width() == 0 || probe.height() == 0 {
            return Err(MediaError::CodecFailed {
                message: "video template has no frame size".to_string(),
            });
        }
        let target = FrameTarget {
            width: probe.width(),
            height: probe.height(),
            time_base: template.format.time_base,
            frame_rate: template.format.frame_rate.unwrap_or(Rational(30, 1)),
        };

        let filters = drawtext_filter(descriptor, target.width, target.height, font_file);
        build_graph(&probe, template.format.time_base, &filters)?;

        let encoder = open_encoder(settings, &target)?;
        let parameters = Parameters::from(&encoder);
        let output = TrackInfo {
            index: template.index,
            kind: MediaKind::Video,
            codec: format!("{}/{}", MediaKind::Video, parameters.id().name()),
            duration_us: None,
            format: LibavTrackFormat {
                parameters,
                time_base: target.time_base,
                frame_rate: Some(target.frame_rate),
            },
        };

        debug!(
            width = target.width,
            height = target.height,
            filter = %filters,
            "Overlay stage ready"
        );
        Ok(Self {
            filters,
            settings: settings.clone(),
            target,
            output,
            composer: None,
        })
    }
}

impl OverlayStage for DrawTextOverlay {
    type Format = LibavTrackFormat;

    fn output_format(&self) -> TrackInfo<LibavTrackFormat> {
        self.output.clone()
    }

    fn begin_clip(&mut self, source: &TrackInfo<LibavTrackFormat>) -> MediaResult<()> {
        if self.composer.is_some() {
            return Err(MediaError::InvalidState {
                message: "previous clip was not finished".to_string(),
            });
        }
        self.composer = Some(ClipComposer::new(
            source,
            &self.filters,
            &self.settings,
            &self.target,
        )?);
        Ok(())
    }

    fn compose(&mut self, sample: Sample) -> MediaResult<Vec<Sample>> {
        self.composer
            .as_mut()
            .ok_or_else(|| MediaError::InvalidState {
                message: "compose called outside a clip".to_string(),
            })?
            .push(sample)
    }

    fn finish_clip(&mut self) -> MediaResult<Vec<Sample>> {
        match self.composer.take() {
            Some(composer) => composer.finish(),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Anchor, RgbColor};

    #[test]
    fn test_option_escaping() {
        assert_eq!(escape_filter_option("a:b"), "a\\:b");
        assert_eq!(escape_filter_option("it's"), "it\\'s");
        assert_eq!(escape_filter_option("c:\\fonts"), "c\\:\\\\fonts");
    }

    #[test]
    fn test_graph_escaping() {
        assert_eq!(escape_filter_graph("a,b;c"), "a\\,b\\;c");
        assert_eq!(escape_filter_graph("[x]"), "\\[x\\]");
        assert_eq!(escape_filter_graph("a\\:b"), "a\\\\:b");
    }

    #[test]
    fn test_drawtext_filter_for_default_overlay() {
        let filter = drawtext_filter(&OverlayDescriptor::default(), 1280, 720, None);
        assert_eq!(
            filter,
            "scale=1280:720,drawtext=text=Made with 3S:expansion=none:fontsize=29:\
             fontcolor=0xFFFFFF@0.627:x=(w-text_w)*0.9500:y=(h-text_h)*0.9500,format=yuv420p"
        );
    }

    #[test]
    fn test_drawtext_filter_escapes_text_and_font() {
        let descriptor = OverlayDescriptor {
            text: "Day 1: Rome, Italy".to_string(),
            color: RgbColor { r: 0x12, g: 0xab, b: 0x00 },
            opacity: 255,
            anchor: Anchor { x: -1.0, y: 1.0 },
            ..OverlayDescriptor::default()
        };
        let filter = drawtext_filter(&descriptor, 640, 360, Some("/fonts/Sans:Bold.ttf"));

        assert!(filter.contains("text=Day 1\\\\: Rome\\, Italy:"));
        assert!(filter.contains("fontcolor=0x12AB00@1.000"));
        assert!(filter.contains("x=(w-text_w)*0.0000:y=(h-text_h)*0.0000"));
        assert!(filter.contains(":fontfile=/fonts/Sans\\\\:Bold.ttf"));
        assert!(filter.ends_with(",format=yuv420p"));
    }

    #[test]
    fn test_drain_stops_on_again_and_eof_but_surfaces_faults() {
        let again = ffmpeg_next::Error::Other {
            errno: ffmpeg_next::util::error::EAGAIN,
        };
        assert!(!drained(Ok(()), "encode frame", codec_error).unwrap());
        assert!(drained(Err(again), "encode frame", codec_error).unwrap());
        assert!(drained(Err(ffmpeg_next::Error::Eof), "encode frame", codec_error).unwrap());

        let err = drained(Err(ffmpeg_next::Error::InvalidData), "encode frame", codec_error)
            .unwrap_err();
        assert!(matches!(err, MediaError::CodecFailed { .. }));
        assert!(err.to_string().contains("encode frame"));
    }
}
