use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, StructuredOutputFormat};

use remedy_core::AiSettings;

use crate::error::InvocationError;
use crate::prompt::PromptRequest;

/// Capability to run one rendered template against a text model.
///
/// Implementations issue exactly one request per call and return the raw
/// response text. Schema checking happens on this side of the boundary.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, request: &PromptRequest) -> Result<String, InvocationError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, InvocationError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(InvocationError::UnknownProvider(other.to_string())),
    }
}

/// Model backed by the `llm` crate, configured from [`AiSettings`].
#[derive(Debug, Clone)]
pub struct LlmModel {
    settings: AiSettings,
}

impl LlmModel {
    pub fn new(settings: AiSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }
}

fn structured_format(request: &PromptRequest) -> Result<StructuredOutputFormat, InvocationError> {
    serde_json::from_value(serde_json::json!({
        "name": request.template.output_name(),
        "description": request.template.id(),
        "schema": request.schema,
        "strict": true,
    }))
    .map_err(|e| InvocationError::Build(format!("output schema: {e}")))
}

#[async_trait]
impl TextModel for LlmModel {
    async fn complete(&self, request: &PromptRequest) -> Result<String, InvocationError> {
        if !remedy_core::ai_configured(&self.settings) {
            return Err(InvocationError::NotConfigured);
        }
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(&request.system)
            .schema(structured_format(request)?);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| InvocationError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(&request.user).build()];

        log::debug!(
            "sending {} to {} ({})",
            request.template.id(),
            self.settings.provider,
            self.settings.model
        );

        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| InvocationError::Request(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(InvocationError::EmptyResponse),
        }
    }
}
