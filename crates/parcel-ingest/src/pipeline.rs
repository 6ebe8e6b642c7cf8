//! Pipeline orchestrator: the entry points the call bridge invokes.
//!
//! `prepare` runs detect -> resolve -> metadata -> extract -> tokens and
//! assembles an [`ExtractionResult`]. Degraded extraction still returns a
//! result (with empty content); only resource and wiring failures are errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use parcel_core::{
    CanonicalType, Error, ExtractionResult, PipelineConfig, Result, StagePayload, TokenEstimator,
    TypeDetector,
};

use crate::adapters::{ExtractionContext, ExtractorKind};
use crate::registry::AdapterRegistry;
use crate::staging::TempFileManager;

/// Owns everything one process needs to prepare attachments.
pub struct AttachmentPipeline {
    config: PipelineConfig,
    registry: Arc<AdapterRegistry>,
    detector: TypeDetector,
    temp_files: TempFileManager,
    estimator: TokenEstimator,
    permits: Arc<Semaphore>,
}

impl AttachmentPipeline {
    /// Pipeline with the default registry.
    ///
    /// # Errors
    /// Returns `Config` if the configured token counter cannot be built.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_registry(config, AdapterRegistry::with_defaults())
    }

    /// Pipeline with a caller-supplied registry.
    pub fn with_registry(config: PipelineConfig, registry: AdapterRegistry) -> Result<Self> {
        let estimator = TokenEstimator::from_counter(config.token_counter)?;
        let temp_files = TempFileManager::new(config.temp_dir.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_extractions.max(1)));
        info!(
            temp_dir = %config.temp_dir.display(),
            max_concurrent = config.max_concurrent_extractions,
            tokenizer = estimator.name(),
            "Attachment pipeline ready"
        );
        Ok(Self {
            config,
            registry: Arc::new(registry),
            detector: TypeDetector::new(),
            temp_files,
            estimator,
            permits,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn temp_files(&self) -> &TempFileManager {
        &self.temp_files
    }

    /// Detect the canonical type of a path without extracting anything.
    pub async fn detect(&self, path: &Path) -> CanonicalType {
        self.detector.detect(path).await
    }

    /// Prepare one attachment.
    ///
    /// A valid `type_hint` takes priority over detection; an unparseable one,
    /// or a `directory` hint on a regular file, is ignored. Directories are
    /// delegated to [`Self::prepare_directory`].
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `Io` if the path exists but cannot be stat'ed
    /// - `NoExtractor` if the registry has no entry and no fallback
    pub async fn prepare(&self, path: impl AsRef<Path>, type_hint: Option<&str>) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await.map_err(|e| stat_error(path, e))?;
        if meta.is_dir() {
            return self.prepare_directory(path).await;
        }

        let hint = type_hint.and_then(|raw| match CanonicalType::parse(raw) {
            Some(parsed) if parsed.is_directory() => {
                warn!(file = %path.display(), hint = raw, "Ignoring directory hint for a regular file");
                None
            }
            Some(parsed) => Some(parsed),
            None => {
                warn!(file = %path.display(), hint = raw, "Ignoring invalid type hint");
                None
            }
        });

        let ctx = ExtractionContext::new(path, hint);
        let file_type = ctx.resolve_type(&self.detector).await.clone();
        let kind = self
            .registry
            .resolve(&file_type)
            .ok_or_else(|| Error::NoExtractor(file_type.to_string()))?;

        self.run(&ctx, &file_type, kind).await
    }

    /// Prepare a directory. Skips detection and always uses the directory
    /// extractor.
    ///
    /// # Errors
    /// - `NotFound` if the path does not exist
    /// - `Io` if the path exists but cannot be stat'ed
    /// - `InvalidInput` if the path is not a directory
    pub async fn prepare_directory(&self, path: impl AsRef<Path>) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await.map_err(|e| stat_error(path, e))?;
        if !meta.is_dir() {
            return Err(Error::InvalidInput(format!("Not a directory: {}", path.display())));
        }

        let ctx = ExtractionContext::with_type(path, CanonicalType::directory());
        self.run(&ctx, &CanonicalType::directory(), ExtractorKind::Directory).await
    }

    /// Prepare several attachments concurrently. Each path gets its own result.
    pub async fn prepare_many<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Result<ExtractionResult>> {
        join_all(paths.iter().map(|p| self.prepare(p.as_ref(), None))).await
    }

    /// Write a raw payload to the staging directory and schedule its removal
    /// after the configured delay. The returned path can go to [`Self::prepare`].
    pub async fn stage_raw_payload(&self, name: &str, payload: impl Into<StagePayload>) -> Result<PathBuf> {
        let path = self.temp_files.stage(name, payload).await?;
        self.temp_files.schedule_cleanup(path.clone(), self.config.cleanup_delay);
        Ok(path)
    }

    /// Advisory check callers use to skip the pipeline for types they handle
    /// themselves (images).
    pub fn should_extract(&self, file_type: &CanonicalType) -> bool {
        parcel_core::should_extract(file_type)
    }

    /// Best-effort removal of every staged file. Returns the number removed.
    pub async fn shutdown(&self) -> usize {
        self.temp_files.cleanup_all().await
    }

    async fn run(&self, ctx: &ExtractionContext, file_type: &CanonicalType, kind: ExtractorKind) -> Result<ExtractionResult> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("Extraction semaphore closed: {}", e)))?;

        let name = ctx.name();
        debug!(file = %name, mime = %file_type, extractor = %kind, "Extracting");

        let metadata = kind.collect_metadata(ctx, &self.config).await;
        let input = kind.extract_for_model(ctx, &self.config).await;
        let thumbnail = kind.thumbnail(ctx, &self.config).await;
        let tokens = input.estimate_tokens(&self.estimator);

        if input.is_empty() && kind != ExtractorKind::Directory {
            debug!(file = %name, mime = %file_type, extractor = %kind, "No content extracted");
        }
        info!(file = %name, mime = %file_type, extractor = %kind, tokens, "Prepared attachment");

        Ok(ExtractionResult {
            name,
            tokens,
            path: ctx.path().to_path_buf(),
            file_type: file_type.clone(),
            metadata,
            content: input.into_content(),
            thumbnail,
        })
    }
}

/// Only a missing path is `NotFound`; other stat failures keep their cause.
fn stat_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(format!("{}: {}", path.display(), e))
    } else {
        Error::Io(e)
    }
}
