use std::sync::Arc;

use crate::backend::BackendContext;
use crate::capture::upload::UploadPipeline;
use crate::config::Config;
use crate::generation::generator::QuestionGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Session, document store and blob store, built once at startup.
    pub backend: BackendContext,
    /// Pluggable question generator. Default: LlmQuestionGenerator.
    pub generator: Arc<dyn QuestionGenerator>,
    pub uploads: UploadPipeline,
}

impl AppState {
    pub fn new(config: Config, backend: BackendContext, generator: Arc<dyn QuestionGenerator>) -> Self {
        let uploads = UploadPipeline::new(backend.documents.clone(), backend.blobs.clone());
        Self {
            config,
            backend,
            generator,
            uploads,
        }
    }
}
