//! FakeLlm — scripted-response Llm for testing.

use crate::traits::{Llm, LlmError, LlmRequest};
use async_trait::async_trait;
use std::sync::Mutex;

/// An `Llm` that returns pre-scripted responses in order, or echoes the
/// prompt back if the script runs out.
pub struct FakeLlm {
    responses: Mutex<Vec<String>>,
}

impl FakeLlm {
    /// Create a fake that returns `responses` in order, then echoes the
    /// prompt back once exhausted.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
        }
    }
}

#[async_trait]
impl Llm for FakeLlm {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let mut responses = self.responses.lock().expect("fake llm lock poisoned");
        Ok(responses.pop().unwrap_or(request.prompt))
    }
}
