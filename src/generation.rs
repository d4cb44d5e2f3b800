// Generation client: one request/response call to a generateContent endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GENERATION_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

pub const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response structure: {0}")]
    Parse(String),
}

/// Anything that can turn a prompt into continuation text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ── Wire format ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateRequest {
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

/// Join every text part of the first candidate with a single space.
pub fn extract_text(response: GenerateResponse) -> Result<String, GenerationError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| GenerationError::Parse("missing 'content' or 'parts'".into()))?;

    let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        return Err(GenerationError::Parse("missing 'content' or 'parts'".into()));
    }
    Ok(texts.join(" "))
}

// ── Gemini client ────────────────────────────────────────────────────

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GenerationError::Network(e.without_url().to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NoApiKey)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Generation API error response ({status}): {body}");
            return Err(GenerationError::Api {
                status,
                message: body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.without_url().to_string()))?;

        extract_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest::from_prompt("hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "contents": [ { "parts": [ { "text": "hello" } ] } ] })
        );
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": "The dragon woke." }, { "text": "It was hungry." } ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        }))
        .unwrap();
        assert_eq!(
            extract_text(resp).unwrap(),
            "The dragon woke. It was hungry."
        );
    }

    #[test]
    fn test_extract_text_missing_candidates() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(extract_text(resp), Err(GenerationError::Parse(_))));
    }

    #[test]
    fn test_extract_text_missing_content() {
        let resp: GenerateResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [ { "finishReason": "SAFETY" } ] }))
                .unwrap();
        assert!(matches!(extract_text(resp), Err(GenerationError::Parse(_))));
    }

    #[tokio::test]
    async fn test_no_api_key_fails_without_request() {
        let client =
            GeminiClient::new("http://127.0.0.1:9/unused", None, Duration::from_secs(1)).unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::NoApiKey));
    }

    #[tokio::test]
    async fn test_network_error_omits_api_key() {
        let client = GeminiClient::new(
            "http://127.0.0.1:1/gen",
            Some("SUPERSECRETKEY".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)));
        assert!(!err.to_string().contains("SUPERSECRETKEY"));
    }
}
