//! LLM backend infrastructure for the semantic-review engine.
//!
//! The backend abstraction switches between a local inference endpoint and a
//! managed serving endpoint without the review engine knowing which is in
//! use. Selection happens once, from the environment, at pipeline start.

pub mod backend;
pub mod mock;
pub mod ollama;
pub mod prompts;
pub mod serving;

pub use backend::LlmBackend;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use serving::ServingBackend;

use std::sync::Arc;

/// Pick a backend from the environment: a fully configured serving endpoint
/// wins, otherwise the local inference endpoint (which may still turn out to
/// be unreachable; the review engine probes availability before use).
pub fn default_backend() -> Arc<dyn LlmBackend> {
    if std::env::var(serving::ENV_HOST).is_ok() && std::env::var(serving::ENV_TOKEN).is_ok() {
        if let Ok(backend) = ServingBackend::from_env() {
            return Arc::new(backend);
        }
    }
    Arc::new(OllamaBackend::from_env())
}
