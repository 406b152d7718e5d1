//! Application state for the merge server

use std::sync::Arc;

use pdfmerge_core::{LopdfMerger, MergeConfig, MergeEngine, Storage, StorageError};

pub struct AppState {
    pub config: MergeConfig,
    pub storage: Storage,
    pub engine: Arc<dyn MergeEngine>,
}

impl AppState {
    /// Build state with the lopdf engine and create both directories
    pub async fn new(config: MergeConfig) -> Result<Self, StorageError> {
        Self::with_engine(config, Arc::new(LopdfMerger)).await
    }

    pub async fn with_engine(
        config: MergeConfig,
        engine: Arc<dyn MergeEngine>,
    ) -> Result<Self, StorageError> {
        let storage = Storage::new(&config);
        storage.init().await?;

        tracing::info!("Upload directory: {}", storage.upload_dir().display());
        tracing::info!("Output directory: {}", storage.output_dir().display());

        Ok(Self {
            config,
            storage,
            engine,
        })
    }
}
