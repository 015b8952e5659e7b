//! Merge tests against FFmpeg
//!
//! Clips are generated with the `ffmpeg` command-line tool. When it is not
//! installed, or lacks what a test needs, the test returns early.

use std::path::{Path, PathBuf};
use std::process::Command;

use reelmerge::app::container::{AppContainer, DefaultAppContainer};
use reelmerge::domain::model::{MediaKind, MergeRequest, MergeSettings, OverlayDescriptor};
use reelmerge::{CancellationToken, MergeError};
use tempfile::TempDir;

// Test utilities

fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// drawtext needs a usable font, which minimal images often lack
fn drawtext_available() -> bool {
    Command::new("ffmpeg")
        .args([
            "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i", "color=c=black:s=64x64",
            "-vf", "drawtext=text=probe", "-frames:v", "1", "-f", "null", "-",
        ])
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// H.264 + AAC clip of `seconds` at 320x240, 30 fps
fn create_test_clip(dir: &Path, name: &str, seconds: f64) -> PathBuf {
    let path = dir.join(name);
    let duration = seconds.to_string();
    let output = Command::new("ffmpeg")
        .args([
            "-hide_banner", "-loglevel", "error",
            "-f", "lavfi", "-i", &format!("testsrc=duration={}:size=320x240:rate=30", duration),
            "-f", "lavfi", "-i", &format!("sine=frequency=440:duration={}", duration),
            "-c:v", "libx264", "-g", "15", "-pix_fmt", "yuv420p",
            "-c:a", "aac", "-t", &duration, "-y",
        ])
        .arg(&path)
        .output()
        .expect("failed to run ffmpeg");
    assert!(
        output.status.success(),
        "ffmpeg failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    path
}

fn container() -> DefaultAppContainer<reelmerge::adapters::LibavToolkit> {
    DefaultAppContainer::new(&MergeSettings::default()).unwrap()
}

fn request(clips: &[&Path], output: &Path) -> MergeRequest {
    MergeRequest::new(
        clips.iter().map(|c| c.display().to_string()).collect(),
        output.display().to_string(),
    )
}

#[tokio::test]
async fn test_stream_copy_merge_of_two_clips() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let first = create_test_clip(dir.path(), "first.mp4", 2.0);
    let second = create_test_clip(dir.path(), "second.mp4", 1.0);
    let output = dir.path().join("merged.mp4");
    let container = container();

    let response = container
        .merge_interactor()
        .merge(request(&[&first, &second], &output), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.clip_count, 2);
    assert!(!response.overlay_applied);
    assert!((2_900_000..=3_100_000).contains(&response.duration_us));

    let report = container
        .verify_interactor()
        .verify(output.clone())
        .await
        .unwrap();
    assert!(report.is_monotonic());
    let video = report.track(MediaKind::Video).unwrap();
    assert_eq!(video.samples, 90);
    assert!(video.key_frames >= 2);
    assert!(report.track(MediaKind::Audio).is_some());
}

#[tokio::test]
async fn test_watermarked_merge_reencodes_video() {
    if !ffmpeg_available() || !drawtext_available() {
        eprintln!("ffmpeg with drawtext not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let first = create_test_clip(dir.path(), "first.mp4", 1.0);
    let second = create_test_clip(dir.path(), "second.mp4", 1.0);
    let output = dir.path().join("merged.mp4");
    let container = container();

    let response = container
        .merge_interactor()
        .merge(
            request(&[&first, &second], &output)
                .with_overlay(OverlayDescriptor::with_text("Made with 3S")),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(response.overlay_applied);

    let report = container.verify_interactor().verify(output).await.unwrap();
    assert!(report.is_monotonic());
    let video = report.track(MediaKind::Video).unwrap();
    assert_eq!(video.samples, 60);
    assert_eq!(video.track.codec, "video/h264");
}

#[tokio::test]
async fn test_unreadable_clip_index_and_no_output() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let first = create_test_clip(dir.path(), "first.mp4", 1.0);
    let missing = dir.path().join("missing.mp4");
    let output = dir.path().join("merged.mp4");

    let err = container()
        .merge_interactor()
        .merge(request(&[&first, &missing], &output), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, MergeError::ClipUnreadable { index: 1 });
    assert!(!output.exists());
}

#[tokio::test]
async fn test_corrupt_first_clip_is_index_zero() {
    let dir = TempDir::new().unwrap();
    let corrupt = dir.path().join("corrupt.mp4");
    std::fs::write(&corrupt, b"this is not a video").unwrap();
    let output = dir.path().join("merged.mp4");

    let err = container()
        .merge_interactor()
        .merge(request(&[&corrupt], &output), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, MergeError::ClipUnreadable { index: 0 });
    assert!(!output.exists());
}

#[tokio::test]
async fn test_inspect_lists_tracks() {
    if !ffmpeg_available() {
        eprintln!("ffmpeg not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let clip = create_test_clip(dir.path(), "clip.mp4", 1.0);

    let response = container()
        .inspect_interactor()
        .inspect(vec![clip])
        .await
        .unwrap();
    assert_eq!(response.first_unreadable, None);
    let kinds: Vec<_> = response.clips[0].tracks.iter().map(|t| t.kind).collect();
    assert!(kinds.contains(&MediaKind::Video));
    assert!(kinds.contains(&MediaKind::Audio));
    assert_eq!(response.planned_kinds, vec![MediaKind::Video, MediaKind::Audio]);
}
