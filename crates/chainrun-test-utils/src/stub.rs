use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::TextGenerator;

/// Scripted [`TextGenerator`].
///
/// Prompts with a scripted reply get it; anything else is answered with the
/// prompt uppercased. Every prompt is recorded.
#[derive(Default)]
pub struct StubGenerator {
    replies: HashMap<String, String>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(prompt.into(), reply.into());
        self
    }

    /// Fail every call with `ChainError::Generation(message)`.
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompts received so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TextGenerator for StubGenerator {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(prompt.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(ref message) = self.failure {
                return Err(ChainError::Generation(message.clone()));
            }
            Ok(self
                .replies
                .get(&prompt)
                .cloned()
                .unwrap_or_else(|| prompt.to_uppercase()))
        })
    }
}
