//! # parcel-core
//!
//! Core types for the parcel attachment pipeline: canonical content types,
//! type detection, token accounting, configuration and errors.
//!
//! Extraction itself lives in `parcel-ingest`, which depends on this crate.

pub mod config;
pub mod defaults;
pub mod detect;
pub mod error;
pub mod models;
pub mod sniff;
pub mod tokenizer;

// Re-export commonly used types at crate root
pub use config::{PipelineConfig, TokenCounter};
pub use detect::{describe_kind, known_kind, mime_from_extension, mime_from_filename, TypeDetector};
pub use error::{Error, Result};
pub use models::*;
pub use sniff::{looks_like_text, looks_like_text_with, sample_looks_like_text};
pub use tokenizer::{estimate_image_tokens, estimate_tokens, TokenEstimator};
