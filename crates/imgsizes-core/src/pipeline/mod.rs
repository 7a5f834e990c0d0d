//! Image generation pipeline components.
//!
//! - **discovery**: Find source images under the root directories
//! - **plan**: Resolve the (width, format) targets an image still needs
//! - **codec**: Decode, resize, and encode through the `image` crate
//! - **crop**: Produce every derivative of one image from a single decode
//! - **queue**: Bounded work queue with exactly-once drain detection
//! - **processor**: Wires the stages to an output sink

pub mod codec;
pub mod crop;
pub mod discovery;
pub mod plan;
pub mod processor;
pub mod queue;

// Re-exports for convenient access
pub use codec::{DecodedImage, ImageCodec};
pub use crop::CropGenerator;
pub use discovery::FileDiscovery;
pub use plan::{resolve_formats, ImageCandidate, PlannedImage, TargetPlanner};
pub use processor::ImageProcessor;
pub use queue::{DrainSignal, WorkQueue};
