//! Narrative commentary on computed metrics.
//!
//! The engine hands a rendered prompt to a `NarrativeGenerator` and never looks
//! at the structure of the text that comes back. Any failure of the generator
//! degrades to `Narrative::Unavailable`; numeric output is never blocked.
//!
//! Backends:
//! - `OpenAiCompatibleClient`: any server speaking `/v1/chat/completions`
//! - `MockGenerator`: canned or failing responses for tests and offline runs

mod mock;
mod openai;
pub mod prompt;

pub use mock::MockGenerator;
pub use openai::OpenAiCompatibleClient;
pub use prompt::{PromptKind, render_prompt};

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{AiModel, InflationSummary};

/// Shown when no narrative service is configured.
pub const NO_SERVICE: &str = "no AI host configured (set CPI_AI_HOST)";

/// The narrative service could not produce text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("narrative generation unavailable: {reason}")]
pub struct GenerationUnavailableError {
    pub reason: String,
}

impl GenerationUnavailableError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Turns a formatted prompt into prose.
pub trait NarrativeGenerator: Send + Sync {
    fn generate(&self, prompt: &str, model: AiModel) -> Result<String, GenerationUnavailableError>;
}

/// Outcome of a narrative request, always displayable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    Text(String),
    Unavailable(String),
}

impl Narrative {
    pub fn text(&self) -> Option<&str> {
        match self {
            Narrative::Text(t) => Some(t),
            Narrative::Unavailable(_) => None,
        }
    }
}

/// Ask `generator` for commentary, degrading instead of failing.
pub fn narrate(generator: &dyn NarrativeGenerator, prompt: &str, model: AiModel) -> Narrative {
    match generator.generate(prompt, model) {
        Ok(text) if text.trim().is_empty() => {
            warn!(model = %model, "narrative service returned empty text");
            Narrative::Unavailable("empty response".to_string())
        }
        Ok(text) => {
            debug!(model = %model, chars = text.len(), "narrative generated");
            Narrative::Text(text.trim().to_string())
        }
        Err(e) => {
            warn!(model = %model, reason = %e.reason, "narrative unavailable");
            Narrative::Unavailable(e.reason)
        }
    }
}

/// What one short commentary covers: a group, or a single category.
#[derive(Debug, Clone)]
pub struct Subject {
    pub name: String,
    pub summaries: Vec<InflationSummary>,
}

/// `narrate`, or `Unavailable` when there is no generator.
pub fn narrate_with(generator: Option<&dyn NarrativeGenerator>, prompt: &str, model: AiModel) -> Narrative {
    match generator {
        Some(g) => narrate(g, prompt, model),
        None => Narrative::Unavailable(NO_SERVICE.to_string()),
    }
}

/// One category-style commentary per subject; each one degrades on its own.
pub fn narrate_each(
    generator: Option<&dyn NarrativeGenerator>,
    subjects: &[Subject],
    model: AiModel,
) -> Vec<(String, Narrative)> {
    subjects
        .iter()
        .map(|subject| {
            let narrative = if subject.summaries.is_empty() {
                Narrative::Unavailable(format!("no data for {}", subject.name))
            } else {
                let prompt = render_prompt(PromptKind::Category, &subject.summaries, None);
                narrate_with(generator, &prompt, model)
            };
            (subject.name.clone(), narrative)
        })
        .collect()
}
