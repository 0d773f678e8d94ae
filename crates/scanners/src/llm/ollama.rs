//! Local-inference backend speaking the Ollama HTTP API.

use crate::llm::backend::LlmBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3";

pub struct OllamaBackend {
    client: reqwest::Client,
    model: String,
    endpoint: String,
}

impl OllamaBackend {
    pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            model: model.into(),
            endpoint,
        }
    }

    pub fn from_env() -> Self {
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let endpoint =
            std::env::var("OLLAMA_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(model, endpoint)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        });

        debug!(model = %self.model, "sending generate request to local endpoint");
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("local inference request failed")?
            .error_for_status()
            .context("local inference endpoint returned an error status")?;

        let body: GenerateResponse = response
            .json()
            .await
            .context("failed to parse local inference response")?;
        Ok(body.response.unwrap_or_default().trim().to_string())
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        let Ok(response) = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        let Ok(tags) = response.json::<TagsResponse>().await else {
            return false;
        };
        tags.models
            .iter()
            .any(|m| m.name.as_deref().is_some_and(|n| n.contains(&self.model)))
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    fn setup_hint(&self) -> String {
        format!(
            "Start the local inference service at {} and pull the '{}' model.",
            self.endpoint, self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: Option<String>,
}
