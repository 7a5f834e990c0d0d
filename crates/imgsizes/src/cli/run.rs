//! The `imgsizes run` and `imgsizes hook` commands.

use clap::Args;
use imgsizes_core::{Config, ImageReport, RunSummary, SizeGenerator};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;

use super::types::{ManifestKind, Undersized};

/// Arguments for the `run` command. Every flag overrides the config file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Directory to scan for source images (repeatable)
    #[arg(short, long = "dir", value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Target widths in pixels, comma-separated
    #[arg(short, long = "size", value_delimiter = ',', value_name = "WIDTH")]
    pub sizes: Vec<u32>,

    /// Output formats, comma-separated; `match` keeps the source format
    #[arg(short, long = "format", value_delimiter = ',', value_name = "FORMAT")]
    pub formats: Vec<String>,

    /// Source extensions to pick up, comma-separated
    #[arg(long = "input-format", value_delimiter = ',', value_name = "EXT")]
    pub input_formats: Vec<String>,

    /// JPEG quality (0-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,

    /// Resize up to widths larger than the source
    #[arg(long)]
    pub force_upscale: bool,

    /// Regenerate derivatives even if they already exist
    #[arg(long)]
    pub no_skip_existing: bool,

    /// What to do with widths larger than the source
    #[arg(long, value_enum)]
    pub undersized: Option<Undersized>,

    /// Maximum images processed at once
    #[arg(short = 'j', long)]
    pub max_parallel: Option<usize>,

    /// Write a manifest of generated files to this path
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Manifest encoding
    #[arg(long, value_enum)]
    pub manifest_format: Option<ManifestKind>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Disable the progress indicator
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded config, then validate.
    pub fn apply_overrides(&self, config: &mut Config) -> anyhow::Result<()> {
        let images = &mut config.images;
        if !self.dirs.is_empty() {
            images.dir = self.dirs.clone();
        }
        if !self.sizes.is_empty() {
            images.size = self.sizes.clone();
        }
        if !self.formats.is_empty() {
            images.output_format = self.formats.clone();
        }
        if !self.input_formats.is_empty() {
            images.input_format = self.input_formats.clone();
        }
        if let Some(quality) = self.quality {
            images.quality = quality;
        }
        if self.force_upscale {
            images.force_upscale = true;
        }
        if self.no_skip_existing {
            images.skip_existing = false;
        }
        if let Some(undersized) = self.undersized {
            images.undersized = undersized.into();
        }
        if let Some(max_parallel) = self.max_parallel {
            config.pipeline.max_parallel = max_parallel;
        }
        if let Some(manifest) = &self.manifest {
            config.output.manifest = Some(manifest.clone());
        }
        if let Some(format) = self.manifest_format {
            config.output.manifest_format = format.into();
        }

        config.validate()?;
        Ok(())
    }
}

/// Arguments for the `hook` command.
#[derive(Args, Debug)]
pub struct HookArgs {
    /// Lifecycle stage the build tool is at
    pub stage: String,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the run command.
pub async fn execute(mut config: Config, args: RunArgs) -> anyhow::Result<()> {
    args.apply_overrides(&mut config)?;

    if !config.is_complete() {
        tracing::warn!(
            "Nothing to do: set images.dir, images.size, and images.output_format \
             (or pass --dir, --size, --format)"
        );
        return Ok(());
    }

    let progress = if args.no_progress || args.json || !std::io::stderr().is_terminal() {
        ProgressBar::hidden()
    } else {
        create_spinner()
    };

    let pb = progress.clone();
    let summary = SizeGenerator::new(config)?
        .run_with(move |report| {
            pb.inc(1);
            pb.set_message(describe(report));
        })
        .await?;
    progress.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.has_failures() {
        anyhow::bail!("{} derivative(s) failed", summary.failed);
    }
    Ok(())
}

/// Execute the hook command: run only when `stage` is the configured hook.
pub async fn execute_hook(config: Config, args: HookArgs) -> anyhow::Result<()> {
    if args.stage != config.pipeline.hook {
        tracing::debug!(
            "Stage {:?} is not the configured hook {:?}; skipping",
            args.stage,
            config.pipeline.hook
        );
        return Ok(());
    }
    execute(config, args.run).await
}

fn describe(report: &ImageReport) -> String {
    let name = report
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if report.fully_skipped() {
        format!("{name} (up to date)")
    } else {
        name
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Images found:      {}", summary.discovered);
    println!("  processed:       {}", summary.submitted);
    println!("  up to date:      {}", summary.skipped_images);
    println!("Derivatives:");
    println!("  written:         {}", summary.written);
    if summary.linked > 0 {
        println!("  linked:          {}", summary.linked);
    }
    println!("  already present: {}", summary.pre_existing);
    println!("  too small:       {}", summary.undersized);
    if summary.failed > 0 {
        println!("  failed:          {}", summary.failed);
    }
}

fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} image(s) {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
