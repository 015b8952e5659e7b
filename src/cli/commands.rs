//! Command implementations

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::app::channel::{ChannelResponse, CONVERT_IMAGE_TO_VIDEO};
use crate::app::container::AppContainer;
use crate::cli::args::{ChannelArgs, ConvertImageArgs, InspectArgs, MergeArgs, VerifyArgs};
use crate::domain::errors::MergeError;
use crate::domain::model::{MergeRequest, MergeSettings};
use crate::ports::MediaToolkit;
use crate::utils::time::format_micros;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_NOT_IMPLEMENTED: u8 = 3;

const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v"];

/// Video files directly inside `dir`, sorted by file name. Hidden files are skipped.
pub fn collect_clips(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut clips = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let is_clip = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CLIP_EXTENSIONS.iter().any(|c| ext.eq_ignore_ascii_case(c)));
        if is_clip {
            clips.push(entry.into_path());
        }
    }
    Ok(clips)
}

/// Process status for a failed request
pub fn failure_status(err: &MergeError) -> u8 {
    match err {
        MergeError::NotImplemented(_) => EXIT_NOT_IMPLEMENTED,
        _ => EXIT_FAILURE,
    }
}

fn report_failure(err: &MergeError, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ChannelResponse::from(err))?);
    } else {
        eprintln!("Error [{}]: {}", err.code(), err);
    }
    Ok(ExitCode::from(failure_status(err)))
}

/// Build the merge request. Overlay flags have already been folded into `settings`.
pub fn merge_request(clips: &[PathBuf], output: &Path, settings: &MergeSettings) -> MergeRequest {
    MergeRequest {
        clip_paths: Some(clips.iter().map(|p| p.display().to_string()).collect()),
        output_path: Some(output.display().to_string()),
        overlay: settings
            .watermark
            .enabled
            .then(|| settings.watermark.descriptor()),
    }
}

/// Execute merge command
pub async fn merge<T, C>(
    container: &C,
    settings: &MergeSettings,
    args: MergeArgs,
    cancel: CancellationToken,
) -> Result<ExitCode>
where
    T: MediaToolkit + 'static,
    C: AppContainer<T>,
{
    let clips = match &args.dir {
        Some(dir) => collect_clips(dir)?,
        None => args.clips.clone(),
    };
    info!(clips = clips.len(), output = %args.output.display(), "Executing merge command");

    let request = merge_request(&clips, &args.output, settings);
    let response = match container.merge_interactor().merge(request, cancel).await {
        Ok(response) => response,
        Err(err) => return report_failure(&err, args.json),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!(
            "Merged {} clips into {} ({})",
            response.clip_count,
            response.output_path,
            format_micros(response.duration_us)
        );
        if response.overlay_applied {
            println!("  watermark: {}", settings.watermark.text);
        }
        for track in &response.tracks {
            println!(
                "  {}: {} samples, ends at {}{}",
                track.kind,
                track.samples,
                format_micros(track.end_us),
                if track.adjusted > 0 {
                    format!(", {} timestamps adjusted", track.adjusted)
                } else {
                    String::new()
                }
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Execute inspect command
pub async fn inspect<T, C>(container: &C, args: InspectArgs) -> Result<ExitCode>
where
    T: MediaToolkit + 'static,
    C: AppContainer<T>,
{
    info!(clips = args.clips.len(), "Executing inspect command");
    let response = match container.inspect_interactor().inspect(args.clips).await {
        Ok(response) => response,
        Err(err) => return report_failure(&err, args.json),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        for clip in &response.clips {
            if !clip.readable {
                println!("[{}] {}: unreadable", clip.index, clip.path);
                continue;
            }
            println!("[{}] {}", clip.index, clip.path);
            for track in &clip.tracks {
                let duration = track
                    .duration_us
                    .map(format_micros)
                    .unwrap_or_else(|| "unknown".to_string());
                println!("    #{} {} {} ({})", track.index, track.kind, track.codec, duration);
            }
        }
        let planned: Vec<String> = response.planned_kinds.iter().map(|k| k.to_string()).collect();
        println!("Output tracks: {}", planned.join(", "));
    }

    match response.first_unreadable {
        Some(index) => report_failure(&MergeError::ClipUnreadable { index }, false),
        None => Ok(ExitCode::SUCCESS),
    }
}

/// Execute verify command
pub async fn verify<T, C>(container: &C, args: VerifyArgs) -> Result<ExitCode>
where
    T: MediaToolkit + 'static,
    C: AppContainer<T>,
{
    info!(input = %args.input.display(), "Executing verify command");
    let report = match container.verify_interactor().verify(args.input.clone()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(EXIT_FAILURE));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.path);
        for track in &report.tracks {
            println!(
                "  {} {}: {} samples ({} key), {} - {}{}",
                track.track.kind,
                track.track.codec,
                track.samples,
                track.key_frames,
                format_micros(track.first_pts_us.unwrap_or(0)),
                format_micros(track.end_us),
                if track.monotonic { "" } else { ", timestamps step backwards" }
            );
        }
    }

    if report.is_monotonic() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(input = %args.input.display(), "Merged file has non-monotonic timestamps");
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

/// Execute channel command
pub async fn channel<T, C>(container: &C, args: ChannelArgs, cancel: CancellationToken) -> Result<ExitCode>
where
    T: MediaToolkit + 'static,
    C: AppContainer<T>,
{
    let payload = match args.request {
        Some(request) => request,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read method call from stdin")?;
            buffer
        }
    };

    let response = container.channel_handler().handle_json(&payload, cancel).await;
    println!("{}", serde_json::to_string(&response)?);

    Ok(match response {
        ChannelResponse::Success { .. } => ExitCode::SUCCESS,
        ChannelResponse::Error { .. } => ExitCode::from(EXIT_FAILURE),
        ChannelResponse::NotImplemented { .. } => ExitCode::from(EXIT_NOT_IMPLEMENTED),
    })
}

/// Execute convert-image command
pub fn convert_image(args: ConvertImageArgs) -> Result<ExitCode> {
    warn!(
        image = %args.image.display(),
        output = %args.output.display(),
        "Image to video conversion requested"
    );
    report_failure(&MergeError::NotImplemented(CONVERT_IMAGE_TO_VIDEO.to_string()), false)
}
