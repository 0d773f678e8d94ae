//! Backend abstraction for the semantic-review engine.
//!
//! Two operations are required of every backend: text generation and an
//! availability probe. Concrete backends are a small closed set selected by
//! environment at startup, never hardcoded at call sites.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a completion for `prompt`. Errors are per-call and isolated
    /// by the caller; they never abort a multi-file review.
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Whether the backend is configured and reachable right now.
    async fn is_available(&self) -> bool;

    fn name(&self) -> &'static str;

    /// Human-readable hint shown when the backend is not ready, naming the
    /// specific configuration that is missing.
    fn setup_hint(&self) -> String {
        format!("Verify {} configuration.", self.name())
    }
}
