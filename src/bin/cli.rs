//! filmfeed CLI
//!
//! Builds the configured RSS feeds and writes the changed ones below the
//! output root.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use filmfeed::{
    error::Result,
    models::Config,
    pipeline,
    services::build_id,
    storage::LocalStorage,
    utils::http,
};

/// filmfeed - film catalog RSS feed generator
#[derive(Parser, Debug)]
#[command(name = "filmfeed", version, about = "Film catalog RSS feed generator")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = "feeds.toml")]
    config: PathBuf,

    /// Directory feed output paths are relative to
    #[arg(short, long, global = true, default_value = ".")]
    output_root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build feeds and write the ones that changed
    Run {
        /// Only build the named feed (repeatable)
        #[arg(short, long = "feed", value_name = "NAME")]
        feeds: Vec<String>,
    },

    /// List configured feeds
    List,

    /// Validate the configuration
    Validate,

    /// Discover the build identifier of one or more pages
    BuildId {
        /// Pages to scan, tried in order
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = execute(cli).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let config = Config::load_if_present(&cli.config)?;

    match cli.command {
        Command::Run { feeds } => {
            config.validate()?;

            let client = http::create_client(&config.http)?;
            let storage = LocalStorage::new(&cli.output_root);
            let reports = pipeline::run_all(&config, &feeds, &client, &storage).await?;

            let written = reports.iter().filter(|r| r.outcome.is_written()).count();
            log::info!(
                "Done: {} feed(s), {} written, {} unchanged",
                reports.len(),
                written,
                reports.len() - written
            );
        }

        Command::List => {
            for feed in &config.feeds {
                let credential = feed
                    .source
                    .required_credential()
                    .map(|name| format!(" [{name}]"))
                    .unwrap_or_default();
                println!(
                    "{:<20} {:<14} {}{}",
                    feed.name,
                    feed.source.kind(),
                    cli.output_root.join(&feed.output).display(),
                    credential
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({} feeds)", config.feeds.len());
        }

        Command::BuildId { urls } => {
            let client = http::create_client(&config.http)?;
            let found = build_id::locate(&client, &urls).await?;
            println!("{}", found);
        }
    }

    Ok(())
}
