//! imgsizes core - responsive image generation as a build step.
//!
//! Given directories of source images, imgsizes writes resized copies next to
//! each original as `{stem}@{width}w.{format}`, for every configured width and
//! output format.
//!
//! # Architecture
//!
//! ```text
//! Discover → Plan targets → Bounded work queue → Decode once → Resize/encode per width → Sink
//!                                                                      ↓
//!                                                         Generated-file records → Manifest
//! ```
//!
//! Planning is synchronous and cheap; everything that touches pixels runs in
//! per-image tasks, at most `pipeline.max_parallel` at a time.
//!
//! # Usage
//!
//! ```rust,ignore
//! use imgsizes_core::{Config, SizeGenerator};
//!
//! #[tokio::main]
//! async fn main() -> imgsizes_core::Result<()> {
//!     let config = Config::load()?;
//!     let summary = SizeGenerator::new(config)?.run().await?;
//!     println!("Wrote {} derivative(s)", summary.written);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod generator;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod sink;
pub mod types;

// Re-exports for convenient access
pub use config::{arrayify, Config, ManifestFormat, OneOrMany, UndersizedPolicy};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, SizesError};
pub use generator::SizeGenerator;
pub use output::{read_manifest, write_manifest, OutputWriter};
pub use pipeline::{CropGenerator, ImageCandidate, TargetPlanner, WorkQueue};
pub use records::GeneratedFiles;
pub use sink::{AssetSource, EmittedAsset, FsSink, MemorySink, OutputSink};
pub use types::{
    GeneratedFile, ImageReport, OutputTarget, RunSummary, TargetOutcome, TargetStatus,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
