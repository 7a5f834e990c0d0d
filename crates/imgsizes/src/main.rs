//! imgsizes CLI - generates resized copies of source images as a build step.
//!
//! Reads `imgsizes.toml` (or the file given with `--config`), finds every
//! source image under the configured directories, and writes
//! `{stem}@{width}w.{format}` next to each one.
//!
//! # Usage
//!
//! ```bash
//! # Generate with the project configuration
//! imgsizes run
//!
//! # Override directories and sizes for one run
//! imgsizes run --dir static/img --size 1280,640 --format webp,match
//!
//! # Called by a build tool at a lifecycle stage
//! imgsizes hook renderStart
//!
//! # View configuration
//! imgsizes config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// imgsizes - Responsive image generation for static builds.
#[derive(Parser, Debug)]
#[command(name = "imgsizes")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ./imgsizes.toml, then the user config)
    #[arg(short, long, global = true, env = "IMGSIZES_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate every missing derivative
    Run(cli::run::RunArgs),

    /// Generate only if STAGE is the configured hook
    Hook(cli::run::HookArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_none() => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `imgsizes config path`."
            );
            imgsizes_core::Config::default()
        }
        Err(e) => return Err(e),
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("imgsizes v{}", imgsizes_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(config, args).await,
        Commands::Hook(args) => cli::run::execute_hook(config, args).await,
        Commands::Config(args) => cli::config::execute(config, cli.config, args).await,
    }
}
