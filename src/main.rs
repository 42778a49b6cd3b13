//! `sekai-harvest`: command-line front end for the harvester.
//!
//! ```bash
//! # List character ids
//! sekai-harvest characters
//!
//! # Download everything for character 21 into ./output/dataset_21
//! sekai-harvest run --character 21 --mode all-with-songs --cap 800
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use sekai_voice_harvest::api::simple::init_tracing;
use sekai_voice_harvest::config::{HarvestConfig, Invocation, Mode, DEFAULT_CARD_VOICE_CAP};
use sekai_voice_harvest::engine::harvest::{Harvester, OperationOutcome};

#[derive(Parser)]
#[command(name = "sekai-harvest", version, about)]
struct Cli {
    /// TOML config file; built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output root, overriding the config file.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every character id and name.
    Characters,

    /// Download assets for one character.
    Run {
        #[arg(long)]
        character: i64,

        #[arg(long, value_enum, default_value = "all-with-songs")]
        mode: Mode,

        /// Maximum card voices across all cards.
        #[arg(long, default_value_t = DEFAULT_CARD_VOICE_CAP)]
        cap: usize,

        /// Skip writing the transcript manifest.
        #[arg(long)]
        no_transcripts: bool,

        /// Concurrent download workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Audio file extension, e.g. `wav` or `mp3`.
        #[arg(long)]
        ext: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output_root = output;
    }

    match cli.command {
        Commands::Characters => {
            let harvester = Harvester::connect(config).await?;
            for (id, name) in harvester.characters() {
                println!("{:>3}  {}", id, name);
            }
        }
        Commands::Run {
            character,
            mode,
            cap,
            no_transcripts,
            workers,
            ext,
        } => {
            if let Some(workers) = workers {
                config.worker_count = workers;
            }
            if let Some(ext) = ext {
                config.audio_ext = ext;
            }

            let harvester = Harvester::connect(config).await?;
            let shutdown = harvester.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("interrupt received, stopping (press Ctrl-C again to force quit)");
                shutdown.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    error!("second interrupt, exiting immediately");
                    std::process::exit(130);
                }
            });

            let invocation = Invocation {
                character_id: character,
                mode,
                card_voice_cap: cap,
                save_transcripts: !no_transcripts,
            };

            let result = harvester.run(&invocation).await;
            drop(harvester);

            match result {
                Ok(report) => {
                    for (operation, outcome) in &report.operations {
                        match outcome {
                            OperationOutcome::Completed { downloaded } => {
                                info!("{}: {} files", operation, downloaded)
                            }
                            OperationOutcome::Stopped {
                                downloaded,
                                missing_url,
                            } => warn!(
                                "{}: stopped after {} files ({} missing)",
                                operation, downloaded, missing_url
                            ),
                            OperationOutcome::Skipped { reason } => {
                                warn!("{}: skipped ({})", operation, reason)
                            }
                        }
                    }
                    info!(
                        "{} files in {}",
                        report.total_downloaded(),
                        report.output_dir.display()
                    );
                }
                Err(e) => {
                    error!("harvest aborted: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
