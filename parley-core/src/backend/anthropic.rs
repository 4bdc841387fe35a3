//! Anthropic messages API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, transport_error, Backend, Invocation, ProviderKind};
use crate::{Error, Result};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: MESSAGES_URL.to_string(),
        }
    }

    /// Send requests to another messages endpoint, such as a proxy
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request<'a>(invocation: &Invocation<'a>) -> MessagesRequest<'a> {
        MessagesRequest {
            model: invocation.model,
            max_tokens: invocation.max_output_tokens,
            system: &invocation.persona.directive,
            messages: vec![Message {
                role: "user",
                content: invocation.instruction,
            }],
        }
    }
}

/// Concatenate the text blocks of a reply
fn extract(body: MessagesResponse) -> String {
    debug!(stop_reason = ?body.stop_reason, "Anthropic response");
    body.content
        .into_iter()
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn invoke(&self, invocation: &Invocation<'_>) -> Result<String> {
        let request = Self::request(invocation);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        let response = error_for_status(self.kind(), response).await?;
        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("anthropic returned unreadable JSON: {}", e)))?;

        Ok(extract(body))
    }
}
