//! Managed serving-endpoint backend: bearer-token HTTP inference against a
//! hosted model endpoint. Configuration comes from the environment.

use crate::llm::backend::LlmBackend;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const ENV_HOST: &str = "SERVING_HOST";
pub const ENV_TOKEN: &str = "SERVING_TOKEN";
pub const ENV_ENDPOINT: &str = "SERVING_ENDPOINT";

pub struct ServingBackend {
    client: reqwest::Client,
    host: String,
    token: String,
    endpoint_name: String,
}

impl ServingBackend {
    pub fn new(
        host: impl Into<String>,
        token: impl Into<String>,
        endpoint_name: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
            endpoint_name: endpoint_name.into(),
        }
    }

    /// Build from `SERVING_HOST`, `SERVING_TOKEN` and `SERVING_ENDPOINT`.
    /// All three are required; the error names what is missing so the
    /// diagnostic finding can carry an actionable recommendation.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var(ENV_HOST)
            .with_context(|| format!("missing {ENV_HOST} environment variable"))?;
        let token = std::env::var(ENV_TOKEN)
            .with_context(|| format!("missing {ENV_TOKEN} environment variable"))?;
        let endpoint_name = std::env::var(ENV_ENDPOINT)
            .with_context(|| format!("missing {ENV_ENDPOINT} environment variable"))?;
        Ok(Self::new(host, token, endpoint_name))
    }
}

#[async_trait]
impl LlmBackend for ServingBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String> {
        let url = format!(
            "{}/serving-endpoints/{}/invocations",
            self.host, self.endpoint_name
        );
        let payload = json!({
            "inputs": { "prompt": [prompt] },
            "params": {
                "temperature": temperature,
                "max_tokens": max_tokens,
            },
        });

        debug!(endpoint = %self.endpoint_name, "invoking serving endpoint");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .context("serving endpoint request failed")?
            .error_for_status()
            .context("serving endpoint returned an error status")?;

        let body: Value = response
            .json()
            .await
            .context("failed to parse serving endpoint response")?;

        // Hosted models answer in one of two shapes.
        if let Some(prediction) = body
            .get("predictions")
            .and_then(Value::as_array)
            .and_then(|p| p.first())
            .and_then(Value::as_str)
        {
            return Ok(prediction.trim().to_string());
        }
        if let Some(text) = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
        {
            return Ok(text.trim().to_string());
        }
        bail!("unexpected serving endpoint response shape: {body}")
    }

    async fn is_available(&self) -> bool {
        let url = format!(
            "{}/api/2.0/serving-endpoints/{}",
            self.host, self.endpoint_name
        );
        match self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "serving"
    }

    fn setup_hint(&self) -> String {
        if self.endpoint_name.is_empty() {
            format!("Missing {ENV_ENDPOINT} environment variable.")
        } else {
            format!(
                "Verify the '{}' serving endpoint and the {ENV_TOKEN} credential.",
                self.endpoint_name
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shapes() {
        let predictions = json!({ "predictions": ["VULNERABILITY: x"] });
        let text = predictions["predictions"][0].as_str().unwrap();
        assert_eq!(text, "VULNERABILITY: x");

        let choices = json!({ "choices": [{ "text": "NO_SECURITY_ISSUES_FOUND" }] });
        let text = choices["choices"][0]["text"].as_str().unwrap();
        assert_eq!(text, "NO_SECURITY_ISSUES_FOUND");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let backend = ServingBackend::new("http://127.0.0.1:9", "tok", "ep");
        assert!(!backend.is_available().await);
    }
}
