//! OpenAI-compatible chat completions (OpenAI, Groq, OpenRouter)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, transport_error, Backend, Invocation, ProviderKind};
use crate::{Error, Result};

pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    kind: ProviderKind,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatBackend {
    /// Backend for one of the chat-completions providers
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Self::default_endpoint(kind).ok_or_else(|| {
            Error::Backend(format!("{} does not speak the chat completions API", kind))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            kind,
            api_key: api_key.into(),
            endpoint: endpoint.to_string(),
        })
    }

    /// Send requests to another chat completions URL, such as a local server
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    fn request<'a>(invocation: &Invocation<'a>) -> ChatRequest<'a> {
        ChatRequest {
            model: invocation.model,
            max_tokens: invocation.max_output_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &invocation.persona.directive,
                },
                ChatMessage {
                    role: "user",
                    content: invocation.instruction,
                },
            ],
        }
    }

    /// Content of the first choice; `content: null` is an empty reply
    fn extract(&self, body: ChatResponse) -> Result<String> {
        let Some(choice) = body.choices.into_iter().next() else {
            return Err(Error::Backend(format!("{} returned no choices", self.kind)));
        };
        debug!(provider = %self.kind, finish_reason = ?choice.finish_reason, "Chat completion");

        Ok(choice.message.content.unwrap_or_default())
    }

    fn default_endpoint(kind: ProviderKind) -> Option<&'static str> {
        match kind {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1/chat/completions"),
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1/chat/completions"),
            ProviderKind::OpenRouter => Some("https://openrouter.ai/api/v1/chat/completions"),
            _ => None,
        }
    }
}

#[async_trait]
impl Backend for OpenAiCompatBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn invoke(&self, invocation: &Invocation<'_>) -> Result<String> {
        let request = Self::request(invocation);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.kind, e))?;

        let response = error_for_status(self.kind, response).await?;
        let body: ChatResponse = response.json().await.map_err(|e| {
            Error::Backend(format!("{} returned unreadable JSON: {}", self.kind, e))
        })?;

        self.extract(body)
    }
}
