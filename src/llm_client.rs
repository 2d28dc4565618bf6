//! Client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::settings::AppSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRequest {
    pub model: String,
    pub api_key: String,
    pub prompt: String,
}

#[derive(Debug, Error)]
pub enum RewriteServiceError {
    #[error("Request failed: {0}")]
    Network(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("LLM returned empty response")]
    EmptyResponse,
}

/// Something that turns a prompt into rewritten text.
#[async_trait]
pub trait RewriteService: Send + Sync {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteServiceError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Strip invisible Unicode characters some models sprinkle into output
fn strip_invisible(content: &str) -> String {
    content
        .replace('\u{200B}', "")
        .replace('\u{200C}', "")
        .replace('\u{200D}', "")
        .replace('\u{FEFF}', "")
}

fn parse_completion(body: &str) -> Result<String, RewriteServiceError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| RewriteServiceError::InvalidResponse(e.to_string()))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| strip_invisible(&content))
        .filter(|content| !content.trim().is_empty())
        .ok_or(RewriteServiceError::EmptyResponse)?;
    Ok(content)
}

/// Error message from an API error body, falling back to the raw body
fn parse_api_error(status: u16, body: &str) -> RewriteServiceError {
    let message = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body.trim().to_string(),
    };
    RewriteServiceError::Api { status, message }
}

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn from_settings(settings: &AppSettings) -> anyhow::Result<Self> {
        Self::new(
            settings.base_url.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RewriteService for OpenAiCompatibleClient {
    async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteServiceError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        debug!(model = %request.model, prompt_len = request.prompt.len(), "Sending rewrite request");

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RewriteServiceError::Network("request timed out".to_string())
                } else {
                    RewriteServiceError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RewriteServiceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &text));
        }
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_choice() {
        let body = "{\"choices\":[{\"message\":{\"role\":\"assistant\",\"content\":\"Hello\u{200B} world.\"}},{\"message\":{\"content\":\"second\"}}]}";
        assert_eq!(parse_completion(body).unwrap(), "Hello world.");
    }

    #[test]
    fn test_parse_no_choices_is_empty_response() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, RewriteServiceError::EmptyResponse));
        let err = parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap_err();
        assert!(matches!(err, RewriteServiceError::EmptyResponse));
        let err = parse_completion("{\"choices\":[{\"message\":{\"content\":\" \u{200B}\"}}]}").unwrap_err();
        assert!(matches!(err, RewriteServiceError::EmptyResponse));
    }

    #[test]
    fn test_parse_garbage_is_invalid_response() {
        let err = parse_completion("<html>").unwrap_err();
        assert!(matches!(err, RewriteServiceError::InvalidResponse(_)));
    }

    #[test]
    fn test_api_error_message_is_verbatim() {
        let body = r#"{"error":{"message":"Incorrect API key provided: sk-abc.","type":"invalid_request_error"}}"#;
        let err = parse_api_error(401, body);
        assert_eq!(err.to_string(), "Incorrect API key provided: sk-abc.");
        assert!(matches!(err, RewriteServiceError::Api { status: 401, .. }));
    }

    #[test]
    fn test_api_error_without_json_body() {
        assert_eq!(parse_api_error(502, "Bad Gateway\n").to_string(), "Bad Gateway");
        assert_eq!(parse_api_error(503, "").to_string(), "HTTP 503");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = OpenAiCompatibleClient::new("https://api.example.com/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}
