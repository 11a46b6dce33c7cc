//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod browse;
mod fetch;
mod helpers;
mod parse;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use gemharvest::config::HarvestConfig;
use gemharvest::history::ExtractionMode;

#[derive(Parser)]
#[command(name = "gemharvest")]
#[command(about = "Export event history from profile pages to CSV")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: gemharvest.toml in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Options shared by every harvesting command.
#[derive(Args, Debug, Clone)]
pub(crate) struct HarvestArgs {
    /// Write CSV to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field set to extract (default from config: events)
    #[arg(short, long, value_enum)]
    mode: Option<ExtractionMode>,

    /// JSON cookie export to authenticate with
    #[arg(long)]
    cookies: Option<PathBuf>,
}

impl HarvestArgs {
    /// Apply command-line flags over the loaded config.
    fn apply(&self, config: &mut HarvestConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        // Relative to the working directory, not the config file
        if let Some(ref cookies) = self.cookies {
            let path = std::env::current_dir()
                .map(|dir| dir.join(cookies))
                .unwrap_or_else(|_| cookies.clone());
            config.http.cookies_file = Some(path);
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a paginated history page over HTTP
    Fetch {
        /// History page URL
        url: String,

        /// Saved copy of the first page to start from instead of fetching it
        #[arg(long)]
        initial: Option<PathBuf>,

        #[command(flatten)]
        args: HarvestArgs,
    },

    /// Load a history page in a browser, revealing rows by clicking and scrolling
    Browse {
        /// History page URL
        url: String,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        #[command(flatten)]
        args: HarvestArgs,
    },

    /// Extract records from a saved HTML page
    Parse {
        /// Saved HTML file
        file: PathBuf,

        #[command(flatten)]
        args: HarvestArgs,
    },
}

impl Commands {
    fn args(&self) -> &HarvestArgs {
        match self {
            Commands::Fetch { args, .. }
            | Commands::Browse { args, .. }
            | Commands::Parse { args, .. } => args,
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = HarvestConfig::load(cli.config.as_deref()).await?;
    cli.command.args().apply(&mut config);

    match cli.command {
        Commands::Fetch { url, initial, args } => {
            fetch::cmd_fetch(&config, &url, initial.as_deref(), args.output.as_deref()).await
        }
        Commands::Browse { url, headful, args } => {
            if headful {
                config.browser.headless = false;
            }
            browse::cmd_browse(&config, &url, args.output.as_deref()).await
        }
        Commands::Parse { file, args } => {
            parse::cmd_parse(&config, &file, args.output.as_deref()).await
        }
    }
}
