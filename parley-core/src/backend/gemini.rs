//! Google Gemini generateContent API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, transport_error, Backend, Invocation, ProviderKind};
use crate::{Error, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(rename = "system_instruction")]
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Send requests under another models URL, such as a proxy
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn request<'a>(invocation: &Invocation<'a>) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &invocation.persona.directive,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: invocation.instruction,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: invocation.max_output_tokens,
            },
        }
    }
}

/// Text of the first candidate; a candidate without content is an empty reply
fn extract(body: GenerateResponse) -> Result<String> {
    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(Error::Backend("google returned no candidates".to_string()));
    };
    debug!(finish_reason = ?candidate.finish_reason, "Gemini response");

    Ok(candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default())
}

#[async_trait]
impl Backend for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn invoke(&self, invocation: &Invocation<'_>) -> Result<String> {
        let request = Self::request(invocation);

        let url = format!("{}/{}:generateContent", self.base_url, invocation.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.kind(), e))?;

        let response = error_for_status(self.kind(), response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("google returned unreadable JSON: {}", e)))?;

        extract(body)
    }
}
