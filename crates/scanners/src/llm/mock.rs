//! Scripted backend for tests: canned responses, call counting, optional
//! hard failure, no network.

use crate::llm::backend::LlmBackend;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MockBackend {
    responses: Mutex<Vec<String>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicUsize,
    available: bool,
    should_fail: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            default_response: "NO_SECURITY_ISSUES_FOUND".to_string(),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            available: true,
            should_fail: false,
        }
    }

    /// Backend that reports itself unreachable.
    pub fn unavailable() -> Self {
        let mut backend = Self::new();
        backend.available = false;
        backend
    }

    /// Backend whose generate calls all fail.
    pub fn failing() -> Self {
        let mut backend = Self::new();
        backend.should_fail = true;
        backend
    }

    /// Queue a response; queued responses are consumed in order, after which
    /// the default response is returned.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(response.into());
        self
    }

    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn generate(&self, prompt: &str, _max_tokens: u32, _temperature: f32) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if self.should_fail {
            bail!("mock backend configured to fail");
        }

        let mut queue = self.responses.lock().unwrap();
        if queue.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(queue.remove(0))
        }
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
