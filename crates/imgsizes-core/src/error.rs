//! Error types for the imgsizes pipeline.
//!
//! Per-target failures are reported as settled outcomes and never reach the
//! top-level [`SizesError`]; only configuration problems and failures outside
//! a single target (discovery, manifest writing, task panics) do.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a generation run.
#[derive(Error, Debug)]
pub enum SizesError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline errors that escape a single target
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors (manifest writing)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A spawned image task panicked or was aborted
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The work queue stopped admitting tasks
    #[error("Work queue closed: {0}")]
    Queue(#[from] tokio::sync::AcquireError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Walking a root directory failed
    #[error("Discovery failed under {root}: {message}")]
    Discovery { root: PathBuf, message: String },

    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Resizing to a target width failed
    #[error("Resize to {width}w failed for {path}: {message}")]
    Resize {
        path: PathBuf,
        width: u32,
        message: String,
    },

    /// Encoding into the requested format failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Writing (or linking) the derivative failed
    #[error("Write error for {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// The requested output format has no encoder
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },
}

/// Convenience type alias for run results.
pub type Result<T> = std::result::Result<T, SizesError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
