//! Binary tests for the reelmerge command line

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn reelmerge(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("reelmerge").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("REELMERGE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("convert-image"));
}

#[test]
fn test_convert_image_is_not_implemented() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .args(["convert-image", "--image", "cover.png", "--output", "cover.mp4"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("NOT_IMPLEMENTED"));
}

#[test]
fn test_merge_of_empty_directory_is_invalid() {
    let dir = TempDir::new().unwrap();
    let clips = dir.path().join("clips");
    std::fs::create_dir(&clips).unwrap();

    reelmerge(&dir)
        .args(["merge", "--output", "vlog.mp4", "--dir"])
        .arg(&clips)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("INVALID_ARGS"));
    assert!(!dir.path().join("vlog.mp4").exists());
}

#[test]
fn test_merge_missing_clip_reports_marker_as_json() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .args(["merge", "--clip", "nowhere.mp4", "--output", "vlog.mp4", "--json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CLIP_ERROR_INDEX_0"))
        .stdout(predicate::str::contains("MERGE_ERROR"));
}

#[test]
fn test_out_of_range_crf_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .args(["merge", "--clip", "a.mp4", "--output", "o.mp4", "--crf", "99"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .args(["--config", "absent.toml", "verify", "vlog.mp4"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn test_channel_unknown_method() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .args(["channel", "--request", r#"{"method":"shareToInstagram"}"#])
        .assert()
        .code(3)
        .stdout(predicate::str::contains(r#""status":"NOT_IMPLEMENTED""#));
}

#[test]
fn test_channel_reads_call_from_stdin() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .arg("channel")
        .write_stdin(r#"{"method":"mergeVideos","arguments":{"outputPath":"vlog.mp4"}}"#)
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""code":"INVALID_ARGS""#));
}

#[test]
fn test_channel_malformed_json() {
    let dir = TempDir::new().unwrap();
    reelmerge(&dir)
        .args(["channel", "--request", "not json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("INVALID_ARGS"));
}
