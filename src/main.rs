//! reelmerge CLI
//!
//! Merges short clips into one MP4 with continuous timestamps and an optional
//! burned-in text watermark.
//!
//! # Usage
//!
//! ```bash
//! reelmerge merge --clip day1.mp4 --clip day2.mp4 --output vlog.mp4
//! reelmerge merge --dir clips/ --output vlog.mp4 --watermark-text "Road trip"
//! reelmerge inspect day1.mp4 day2.mp4
//! reelmerge verify vlog.mp4
//! echo '{"method":"mergeVideos","arguments":{...}}' | reelmerge channel
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use reelmerge::app::container::DefaultAppContainer;
use reelmerge::cli::{commands, Cli, Commands};
use reelmerge::config_initialization::initialize_configuration_hierarchy;
use reelmerge::ports::LogLevel;
use reelmerge::utils::logging::{init_logging, LogFormat};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match initialize_configuration_hierarchy(&cli).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(commands::EXIT_FAILURE));
        }
    };
    let settings = config.settings;

    // Both were checked during configuration
    let level = LogLevel::parse(&settings.logging.level).unwrap_or(LogLevel::Info);
    let format = LogFormat::parse(&settings.logging.format).unwrap_or_default();
    init_logging(level, format);

    info!("Starting reelmerge");
    debug!(
        source = ?config.source,
        env_overrides = config.env_overrides,
        cli_overrides = config.cli_overrides,
        "Configuration resolved"
    );

    if let Commands::ConvertImage(args) = cli.command {
        return commands::convert_image(args);
    }

    let container = DefaultAppContainer::new(&settings)?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            ctrl_c_cancel.cancel();
        }
    });

    let code = match cli.command {
        Commands::Merge(args) => commands::merge(&container, &settings, args, cancel).await?,
        Commands::Inspect(args) => commands::inspect(&container, args).await?,
        Commands::Verify(args) => commands::verify(&container, args).await?,
        Commands::Channel(args) => commands::channel(&container, args, cancel).await?,
        Commands::ConvertImage(args) => commands::convert_image(args)?,
    };

    info!("reelmerge finished");
    Ok(code)
}
