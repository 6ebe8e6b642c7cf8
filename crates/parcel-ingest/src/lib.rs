//! # parcel-ingest
//!
//! Turns user-supplied files into model-ready content: an adapter registry
//! keyed by canonical type, one extractor per format family, a staging area
//! for raw payloads, and the [`AttachmentPipeline`] that ties them together.
//!
//! ```no_run
//! # async fn run() -> parcel_core::Result<()> {
//! use parcel_ingest::{AttachmentPipeline, PipelineConfig};
//!
//! let pipeline = AttachmentPipeline::new(PipelineConfig::from_env()?)?;
//! let result = pipeline.prepare("report.pdf", None).await?;
//! println!("{} tokens", result.tokens);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod pipeline;
pub mod registry;
pub mod staging;

pub use adapters::{ExtractionContext, ExtractorKind, ModelInput};
pub use pipeline::AttachmentPipeline;
pub use registry::AdapterRegistry;
pub use staging::{decode_payload, sanitize_filename, TempFileManager, TempFileRecord};

pub use parcel_core::{
    CanonicalType, Error, ExtractionResult, FileMetadata, PipelineConfig, Result, StagePayload,
    TokenCounter,
};
