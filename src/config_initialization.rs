//! Configuration initialization and hierarchy management
//!
//! Precedence, lowest first: defaults, TOML file, environment, CLI flags.

use std::path::{Path, PathBuf};

use crate::adapters::toml_config::{TomlConfigAdapter, DEFAULT_CONFIG_FILE};
use crate::cli::{Cli, Commands, MergeArgs};
use crate::domain::model::MergeSettings;
use crate::error::ConfigError;
use crate::ports::{ConfigPort, LogLevel};
use crate::utils::logging::LogFormat;

/// Environment variables and the settings they override
const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("REELMERGE_LOG_LEVEL", "logging.level"),
    ("REELMERGE_WATERMARK_TEXT", "watermark.text"),
    ("REELMERGE_FONT_FILE", "watermark.font_file"),
    ("REELMERGE_ORIENTATION", "output.orientation_hint"),
    ("REELMERGE_VIDEO_ENCODER", "encoder.video_encoder"),
];

/// Resolved settings and where they came from
#[derive(Debug, Clone)]
pub struct ConfigReport {
    pub settings: MergeSettings,
    /// Config file that was loaded, if any
    pub source: Option<PathBuf>,
    pub env_overrides: usize,
    pub cli_overrides: usize,
}

/// Resolve settings against the process environment
pub async fn initialize_configuration_hierarchy(cli: &Cli) -> Result<ConfigReport, ConfigError> {
    initialize_with_env(cli, |key| std::env::var(key).ok()).await
}

/// Resolve settings with `lookup` standing in for the environment
pub async fn initialize_with_env<F>(cli: &Cli, lookup: F) -> Result<ConfigReport, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Step 1: defaults
    let adapter = TomlConfigAdapter::new();

    // Step 2: config file
    let source = config_file(cli);
    if let Some(path) = &source {
        adapter.load_config(&path.to_string_lossy()).await?;
    }
    let mut settings = adapter.settings().await;

    // Step 3: environment
    let mut env_overrides = 0;
    for (env_var, key) in ENV_MAPPINGS {
        if let Some(value) = lookup(env_var) {
            apply_setting(&mut settings, key, value)?;
            env_overrides += 1;
        }
    }

    // Step 4: CLI
    let cli_overrides = apply_cli_overrides(&mut settings, cli);

    settings.validate()?;
    LogLevel::parse(&settings.logging.level)?;
    LogFormat::parse(&settings.logging.format)?;

    Ok(ConfigReport {
        settings,
        source,
        env_overrides,
        cli_overrides,
    })
}

/// `--config` (or `REELMERGE_CONFIG`) when given, else `reelmerge.toml` if present
fn config_file(cli: &Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_FILE);
        default.is_file().then(|| default.to_path_buf())
    })
}

fn apply_setting(settings: &mut MergeSettings, key: &str, value: String) -> Result<(), ConfigError> {
    match key {
        "logging.level" => settings.logging.level = value,
        "watermark.text" => settings.watermark.text = value,
        "watermark.font_file" => settings.watermark.font_file = Some(value),
        "output.orientation_hint" => {
            let degrees = value.trim().parse().map_err(|_| ConfigError::Invalid {
                message: format!("{} must be a number of degrees, got '{}'", key, value),
            })?;
            settings.output.orientation_hint = Some(degrees);
        }
        "encoder.video_encoder" => settings.encoder.video_encoder = value,
        _ => {
            return Err(ConfigError::Invalid {
                message: format!("Unknown setting: {}", key),
            })
        }
    }
    Ok(())
}

fn apply_cli_overrides(settings: &mut MergeSettings, cli: &Cli) -> usize {
    let mut cli_overrides = 0;
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
        cli_overrides += 1;
    }
    if let Some(format) = &cli.log_format {
        settings.logging.format = format.clone();
        cli_overrides += 1;
    }
    if let Commands::Merge(args) = &cli.command {
        cli_overrides += apply_merge_overrides(settings, args);
    }
    cli_overrides
}

fn apply_merge_overrides(settings: &mut MergeSettings, args: &MergeArgs) -> usize {
    let mut overrides = 0;
    let watermark = &mut settings.watermark;

    if args.no_watermark {
        watermark.enabled = false;
        overrides += 1;
    }
    if let Some(text) = &args.watermark_text {
        watermark.enabled = true;
        watermark.text = text.clone();
        overrides += 1;
    }
    if let Some(color) = args.color {
        watermark.color = color;
        overrides += 1;
    }
    if let Some(opacity) = args.opacity {
        watermark.opacity = opacity;
        overrides += 1;
    }
    for (flag, target) in [
        (args.anchor_x, &mut watermark.anchor_x),
        (args.anchor_y, &mut watermark.anchor_y),
        (args.scale_x, &mut watermark.scale_x),
        (args.scale_y, &mut watermark.scale_y),
    ] {
        if let Some(value) = flag {
            *target = value;
            overrides += 1;
        }
    }

    if let Some(degrees) = args.orientation {
        settings.output.orientation_hint = Some(degrees);
        overrides += 1;
    }
    if args.no_faststart {
        settings.output.faststart = false;
        overrides += 1;
    }
    if let Some(crf) = args.crf {
        settings.encoder.crf = crf;
        overrides += 1;
    }
    overrides
}
