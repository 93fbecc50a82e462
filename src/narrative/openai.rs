//! OpenAI-compatible chat completion backend.
//!
//! Works with any server implementing `/v1/chat/completions` (hosted gateways,
//! vLLM, LM Studio, llama.cpp server). The model id is passed through as-is.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationUnavailableError, NarrativeGenerator};
use crate::config::AiSettings;
use crate::domain::AiModel;

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: &str) -> Self {
        let defaults = AiSettings::default();
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    /// `None` when no host is configured.
    pub fn from_settings(settings: &AiSettings) -> Option<Self> {
        let host = settings.host.as_deref()?;
        Some(Self {
            api_key: settings.api_key.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            ..Self::new(host)
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(&self, prompt: &str, model: AiModel) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.as_str().to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            stream: false,
        }
    }
}

impl NarrativeGenerator for OpenAiCompatibleClient {
    fn generate(&self, prompt: &str, model: AiModel) -> Result<String, GenerationUnavailableError> {
        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&self.request_body(prompt, model));

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder
            .send()
            .map_err(|e| GenerationUnavailableError::new(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(GenerationUnavailableError::new(format!(
                "API error {status}: {body}"
            )));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .map_err(|e| GenerationUnavailableError::new(format!("invalid response: {e}")))?;

        debug!(model = %model, choices = chat_response.choices.len(), "chat completion received");
        first_choice(chat_response)
    }
}

fn first_choice(response: ChatCompletionResponse) -> Result<String, GenerationUnavailableError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerationUnavailableError::new("no choices in response"))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash() {
        let client = OpenAiCompatibleClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn from_settings_requires_host() {
        assert!(OpenAiCompatibleClient::from_settings(&AiSettings::default()).is_none());
        let settings = AiSettings {
            host: Some("http://ai.local".into()),
            max_tokens: 200,
            ..AiSettings::default()
        };
        let client = OpenAiCompatibleClient::from_settings(&settings).unwrap();
        assert_eq!(client.max_tokens, 200);
    }

    #[test]
    fn request_serialization() {
        let client = OpenAiCompatibleClient::new("http://localhost");
        let body = client.request_body("Explain CPI", AiModel::MistralLarge2);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "mistral-large2");
        assert_eq!(json["max_tokens"], 1000);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Explain CPI");
        assert_eq!(json["stream"], false);
        assert!((json["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Shelter drove it."}}]
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_choice(response).unwrap(), "Shelter drove it.");
    }

    #[test]
    fn empty_choices_are_unavailable() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_choice(response).is_err());
    }
}
