//! Mock generator for tests and offline runs.

use std::sync::Mutex;

use super::{GenerationUnavailableError, NarrativeGenerator};
use crate::domain::AiModel;

/// Returns a fixed response (or a fixed failure) and records the prompts it saw.
#[derive(Debug)]
pub struct MockGenerator {
    response: Result<String, String>,
    prompts: Mutex<Vec<(String, AiModel)>>,
}

impl MockGenerator {
    pub fn canned(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            response: Err(reason.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<(String, AiModel)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl NarrativeGenerator for MockGenerator {
    fn generate(&self, prompt: &str, model: AiModel) -> Result<String, GenerationUnavailableError> {
        if let Ok(mut seen) = self.prompts.lock() {
            seen.push((prompt.to_string(), model));
        }
        self.response.clone().map_err(GenerationUnavailableError::new)
    }
}
