use std::sync::Arc;

mod backend;
mod model;
mod rig_adapter;

pub use backend::{
    BackendConfig, BackendError, BackendResult, ChatBackend, ChatSession, Reply,
    UnconfiguredBackend,
};
pub use futures::future::BoxFuture;
pub use model::{
    DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL, GEMINI_PROVIDER_ID, OPENAI_PROVIDER_ID,
    canonical_provider_id, default_model_for,
};
pub use rig_adapter::RigBackend;

pub fn create_backend(config: BackendConfig) -> BackendResult<Arc<dyn ChatBackend>> {
    match config.provider_id.as_str() {
        GEMINI_PROVIDER_ID | OPENAI_PROVIDER_ID => Ok(Arc::new(RigBackend::new(config)?)),
        _ => Err(BackendError::UnsupportedProvider {
            stage: "create-backend",
            provider_id: config.provider_id,
        }),
    }
}
