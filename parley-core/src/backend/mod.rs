//! Model invocation backends
//!
//! A [`Backend`] sends one persona directive plus one turn instruction to a
//! text-generation provider and returns the generated text. Backends are
//! thin: no retries, no output interpretation.

mod anthropic;
mod gemini;
mod openai;
mod registry;
mod scripted;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiCompatBackend;
pub use registry::{BackendRegistry, BrainMode, Resolved};
pub use scripted::{RecordedCall, ScriptedBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::persona::Persona;
use crate::{Error, Result};

/// A model provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Google,
    OpenAi,
    Groq,
    OpenRouter,
    /// Offline scripted responses
    Simulated,
}

impl ProviderKind {
    /// Fallback order when a persona's preferred provider is unavailable
    pub const PRIORITY: [ProviderKind; 5] = [
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::OpenAi,
        ProviderKind::Groq,
        ProviderKind::OpenRouter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Simulated => "simulated",
        }
    }

    /// Environment variables holding the API key, checked in order
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
            ProviderKind::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderKind::OpenAi => &["OPENAI_API_KEY"],
            ProviderKind::Groq => &["GROQ_API_KEY"],
            ProviderKind::OpenRouter => &["OPENROUTER_API_KEY"],
            ProviderKind::Simulated => &[],
        }
    }

    /// Model used when a persona does not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::Google => "gemini-2.0-flash",
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::OpenRouter => "nvidia/nemotron-nano-9b-v2:free",
            ProviderKind::Simulated => "scripted",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            "openai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "simulated" | "simulation" | "scripted" => Ok(ProviderKind::Simulated),
            _ => Err(format!(
                "Unknown provider: {}. Valid options: anthropic, google, openai, groq, openrouter, simulated",
                s
            )),
        }
    }
}

/// One request to a backend
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub persona: &'a Persona,
    pub instruction: &'a str,
    pub model: &'a str,
    pub max_output_tokens: u32,
}

/// Trait for text-generation providers
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which provider this backend talks to
    fn kind(&self) -> ProviderKind;

    /// Generate text for one persona turn
    async fn invoke(&self, invocation: &Invocation<'_>) -> Result<String>;
}

/// Map a non-success HTTP response to a backend error
pub(crate) async fn error_for_status(
    kind: ProviderKind,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = truncate(body.trim(), 300);

    Err(Error::Backend(match status.as_u16() {
        401 | 403 => format!("{} rejected the API key ({}): {}", kind, status, body),
        429 => format!("{} rate limit exceeded: {}", kind, body),
        404 => format!("{} model or endpoint not found: {}", kind, body),
        _ => format!("{} HTTP {}: {}", kind, status, body),
    }))
}

pub(crate) fn transport_error(kind: ProviderKind, err: reqwest::Error) -> Error {
    Error::Backend(format!("{} request failed: {}", kind, err))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one HTTP request on localhost with a canned JSON body
    ///
    /// Returns the base URL and a handle that yields the raw request text.
    pub(crate) async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let reply = format!(
                "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!("openrouter".parse::<ProviderKind>().unwrap(), ProviderKind::OpenRouter);
        assert_eq!("simulation".parse::<ProviderKind>().unwrap(), ProviderKind::Simulated);
        assert!("bard".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_serde_names() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let kind: ProviderKind = serde_json::from_str("\"openrouter\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenRouter);
    }

    #[test]
    fn test_google_accepts_two_env_vars() {
        assert_eq!(
            ProviderKind::Google.env_vars(),
            &["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        );
        assert!(ProviderKind::Simulated.env_vars().is_empty());
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
