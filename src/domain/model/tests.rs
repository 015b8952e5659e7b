// Unit tests for domain models

use super::*;

#[test]
fn test_media_kind_from_mime() {
    assert_eq!(MediaKind::from_mime("video/avc"), MediaKind::Video);
    assert_eq!(MediaKind::from_mime("Audio/mp4a-latm"), MediaKind::Audio);
    assert_eq!(MediaKind::from_mime("application/id3"), MediaKind::Other);
    assert_eq!(MediaKind::from_mime(""), MediaKind::Other);
}

#[test]
fn test_sample_rebased_keeps_payload_and_flags() {
    let sample = Sample {
        pts_us: 66_666,
        dts_us: Some(33_333),
        duration_us: 33_333,
        flags: SampleFlags { key_frame: true },
        data: vec![1, 2, 3],
    };

    let moved = sample.clone().rebased(2_000_000);
    assert_eq!(moved.pts_us, 2_066_666);
    assert_eq!(moved.dts_us, Some(2_033_333));
    assert_eq!(moved.duration_us, sample.duration_us);
    assert_eq!(moved.flags, sample.flags);
    assert_eq!(moved.data, sample.data);
}

#[test]
fn test_sample_decode_time_falls_back_to_pts() {
    let sample = Sample::new(40_000, 20_000, false, vec![]);
    assert_eq!(sample.decode_time_us(), 40_000);
    assert_eq!(sample.end_us(), 60_000);
}

#[test]
fn test_timeline_accumulates_and_never_decrements() {
    let timeline = Timeline::start();
    assert_eq!(timeline.offset_us(), 0);

    let timeline = timeline.advanced_by(2_000_000).advanced_by(1_500_000);
    assert_eq!(timeline.offset_us(), 3_500_000);
    let placed = timeline.place(Sample::new(10, 33_333, true, vec![]));
    assert_eq!(placed.pts_us, 3_500_010);

    let unchanged = timeline.advanced_by(-500);
    assert_eq!(unchanged.offset_us(), 3_500_000);
}

#[test]
fn test_rgb_color_parse_forms() {
    assert_eq!(RgbColor::parse("#FF8000").unwrap(), RgbColor { r: 255, g: 128, b: 0 });
    assert_eq!(RgbColor::parse("0x00ff00").unwrap(), RgbColor { r: 0, g: 255, b: 0 });
    assert_eq!(RgbColor::parse("white").unwrap(), RgbColor::WHITE);
    assert!(RgbColor::parse("#FFF").is_err());
    assert!(RgbColor::parse("zzzzzz").is_err());
    assert_eq!(RgbColor::WHITE.to_hex(), "0xFFFFFF");
}

#[test]
fn test_rgb_color_serde_uses_hash_form() {
    let json = serde_json::to_string(&RgbColor { r: 1, g: 2, b: 3 }).unwrap();
    assert_eq!(json, "\"#010203\"");
    let back: RgbColor = serde_json::from_str("\"#0A0B0C\"").unwrap();
    assert_eq!(back, RgbColor { r: 10, g: 11, b: 12 });
    assert!(serde_json::from_str::<RgbColor>("\"red-ish\"").is_err());
}

#[test]
fn test_overlay_defaults_match_watermark() {
    let overlay = OverlayDescriptor::default();
    assert_eq!(overlay.text, "Made with 3S");
    assert_eq!(overlay.opacity, 160);
    assert_eq!(overlay.anchor, Anchor { x: 0.90, y: -0.90 });
    assert_eq!(overlay.scale, OverlayScale { x: 0.35, y: 0.40 });
    assert!(overlay.validate().is_ok());
}

#[test]
fn test_overlay_position_fractions() {
    let mut overlay = OverlayDescriptor::default();
    overlay.anchor = Anchor { x: 1.0, y: -1.0 };
    assert_eq!(overlay.horizontal_fraction(), 1.0);
    assert_eq!(overlay.vertical_fraction(), 1.0);

    overlay.anchor = Anchor { x: -1.0, y: 1.0 };
    assert_eq!(overlay.horizontal_fraction(), 0.0);
    assert_eq!(overlay.vertical_fraction(), 0.0);

    overlay.anchor = Anchor { x: 0.0, y: 0.0 };
    assert_eq!(overlay.horizontal_fraction(), 0.5);
    assert_eq!(overlay.vertical_fraction(), 0.5);
}

#[test]
fn test_overlay_font_size_has_floor() {
    let overlay = OverlayDescriptor::default();
    assert_eq!(overlay.font_size_px(1920), 77);
    assert_eq!(overlay.font_size_px(100), 8);
}

#[test]
fn test_overlay_validation_rejects_out_of_range() {
    let mut overlay = OverlayDescriptor::with_text("hello");
    overlay.anchor.x = 1.5;
    assert!(matches!(overlay.validate(), Err(MergeError::InvalidRequest(_))));

    let mut overlay = OverlayDescriptor::with_text("hello");
    overlay.scale.y = 0.0;
    assert!(overlay.validate().is_err());

    let mut overlay = OverlayDescriptor::with_text("hello");
    overlay.anchor.y = f64::NAN;
    assert!(overlay.validate().is_err());

    assert!(OverlayDescriptor::with_text("   ").validate().is_err());
}

#[test]
fn test_settings_defaults() {
    let settings = MergeSettings::default();
    assert!(settings.watermark.enabled);
    assert_eq!(settings.watermark.descriptor(), OverlayDescriptor::default());
    assert_eq!(settings.encoder.video_encoder, "libx264");
    assert!(settings.output.faststart);
    assert_eq!(settings.output.orientation_hint, None);
    assert!(settings.encoder.thread_count() >= 1);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_settings_partial_toml_keeps_defaults() {
    let settings: MergeSettings = toml::from_str(
        r##"
        [watermark]
        text = "Day 12"
        color = "#FFCC00"

        [output]
        orientation_hint = 90
        "##,
    )
    .unwrap();

    assert_eq!(settings.watermark.text, "Day 12");
    assert_eq!(settings.watermark.color, RgbColor { r: 255, g: 204, b: 0 });
    assert_eq!(settings.watermark.opacity, 160);
    assert_eq!(settings.output.orientation_hint, Some(90));
    assert!(settings.output.faststart);
    assert_eq!(settings.encoder.crf, 20);
}

#[test]
fn test_settings_validation() {
    let mut settings = MergeSettings::default();
    settings.output.orientation_hint = Some(45);
    assert!(settings.validate().is_err());

    let mut settings = MergeSettings::default();
    settings.encoder.crf = 60;
    assert!(settings.validate().is_err());

    let mut settings = MergeSettings::default();
    settings.watermark.scale_y = 3.0;
    assert!(settings.validate().is_err());
}
